use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use stagehand_parser::{validate_property_value, PropertyType};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Raw value as typed by the user
    pub value: String,

    /// Property type (string, token, int, float, double, bool)
    #[arg(value_parser = super::edit::parse_property_type)]
    pub value_type: PropertyType,
}

pub fn validate(args: ValidateArgs) -> Result<()> {
    let validation = validate_property_value(&args.value, args.value_type);
    match validation.into_result() {
        Ok(value) => {
            println!(
                "{} {} {} = {}",
                "✓".green(),
                args.value_type,
                args.value.bright_white(),
                value
            );
            Ok(())
        }
        Err(message) => Err(anyhow!("invalid {} value '{}': {}", args.value_type, args.value, message)),
    }
}
