use crate::errors::SeahorseResult;
use crate::management::base::{Command, Streams};
use crate::management::parser::{Action, Argument, CommandParser};
use crate::management::value::{Options, Value};

/// Provisions a GKE cluster in a shared-VPC host project.
pub struct GkeCommand;

impl Command for GkeCommand {
    fn help(&self) -> &str {
        "Provision a Google GKE cluster."
    }

    fn add_arguments(&self, parser: &mut CommandParser) {
        parser
            .add_argument(
                Argument::option(["--hostproject"])
                    .action(Action::Append)
                    .help("host project share subnet that other project could use"),
            )
            .add_argument(
                Argument::option(["--internal-load-balancer"])
                    .action(Action::Append)
                    .help("internal load balancer distribute data into GKE cluster"),
            )
            .add_argument(
                Argument::option(["--external-load-balancer"])
                    .action(Action::Append)
                    .help("external load balancer distribute data from outside of the cluster"),
            );
    }

    fn handle(&self, streams: &mut Streams, _args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
        let field = |key: &str| options.get(key).cloned().unwrap_or(Value::Null);
        let summary = format!(
            "GKE {} {} {}",
            field("hostproject"),
            field("internal_load_balancer"),
            field("external_load_balancer"),
        );
        streams
            .stdout
            .write_styled(&summary, streams.style.success.as_ref())?;
        Ok(None)
    }
}
