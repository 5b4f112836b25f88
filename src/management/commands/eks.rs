use crate::errors::SeahorseResult;
use crate::management::base::{Command, Streams};
use crate::management::parser::{Action, Argument, CommandParser};
use crate::management::value::{Options, Value};

/// Provisions an EKS cluster.
pub struct EksCommand;

impl Command for EksCommand {
    fn help(&self) -> &str {
        "Provision an Amazon EKS cluster."
    }

    fn add_arguments(&self, parser: &mut CommandParser) {
        parser
            .add_argument(
                Argument::option(["--vpcid"])
                    .action(Action::Append)
                    .help("VPC is required to provision EKS cluster"),
            )
            .add_argument(
                Argument::option(["--CIDR"])
                    .action(Action::Append)
                    .help("CIDR is required to provision EKS cluster"),
            );
    }

    fn handle(&self, streams: &mut Streams, _args: &[String], options: &Options) -> SeahorseResult<Option<String>> {
        let vpcid = options.get("vpcid").cloned().unwrap_or(Value::Null);
        let cidr = options.get("CIDR").cloned().unwrap_or(Value::Null);
        let summary = format!("EKS vpcid {vpcid} cidr {cidr}");
        streams
            .stdout
            .write_styled(&summary, streams.style.success.as_ref())?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::management::output::OutputBuffer;

    #[test]
    fn handle_summarises_the_network() {
        let out = OutputBuffer::new();
        let mut streams = Streams::new(out.shared(), OutputBuffer::new().shared());
        let options = Options::new()
            .with("vpcid", vec!["vpc-1"])
            .with("CIDR", Value::Null);
        EksCommand.handle(&mut streams, &[], &options).unwrap();
        assert_eq!(out.contents(), "EKS vpcid [vpc-1] cidr None\n");
    }

    #[test]
    fn summary_uses_the_success_style_when_colour_is_forced() {
        let out = OutputBuffer::new();
        let mut streams = Streams::new(out.shared(), OutputBuffer::new().shared());
        streams.stdout.force_color(true);
        EksCommand.handle(&mut streams, &[], &Options::new()).unwrap();
        let written = out.contents();
        assert!(written.starts_with("\x1b["));
        assert!(written.contains("EKS vpcid None cidr None"));
    }
}
