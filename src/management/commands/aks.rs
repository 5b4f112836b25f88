use crate::errors::SeahorseResult;
use crate::management::base::{Command, Streams};
use crate::management::parser::{Action, Argument, CommandParser};
use crate::management::value::{Options, Value};

/// Provisions an AKS cluster through the resource manager.
pub struct AksCommand;

impl Command for AksCommand {
    fn help(&self) -> &str {
        "Provision an Azure AKS cluster."
    }

    fn add_arguments(&self, parser: &mut CommandParser) {
        parser
            .add_argument(
                Argument::option(["--subscription"])
                    .action(Action::Append)
                    .help("subscription is required to use AKS service"),
            )
            .add_argument(
                Argument::option(["--public-ip"])
                    .action(Action::Append)
                    .default(Vec::<String>::new())
                    .help("AKS has public IP"),
            )
            .add_argument(
                Argument::option(["--private-ip"])
                    .action(Action::Append)
                    .default(Vec::<String>::new())
                    .help("AKS has private network"),
            );
    }

    fn handle(&self, streams: &mut Streams, _args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
        let field = |key: &str| options.get(key).cloned().unwrap_or(Value::Null);
        let summary = format!(
            "AKS subscription {} public ip {} private ip {}: use resource manager deploying resources",
            field("subscription"),
            field("public_ip"),
            field("private_ip"),
        );
        streams
            .stdout
            .write_styled(&summary, streams.style.success.as_ref())?;
        Ok(None)
    }
}
