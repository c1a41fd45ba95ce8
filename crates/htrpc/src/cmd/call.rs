use serde_json::Value;

use crate::cmd::{connect, CallArgs, REMOTE};
use crate::exit::{rpc_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_value, OutputFormat};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let data = parse_payload(args.json.as_deref())?;
    let client = connect(&args.endpoint).await?;

    let result = client.call(REMOTE, &args.method, data).await;
    // Best effort; the call outcome is what gets reported.
    let _ = client.disconnect().await;

    let value = result.map_err(|err| rpc_error("call failed", err))?;
    print_value(&value, format);
    Ok(SUCCESS)
}

fn parse_payload(json: Option<&str>) -> CliResult<Value> {
    match json {
        Some(text) => serde_json::from_str(text)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}"))),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn payload_defaults_to_null() {
        assert_eq!(parse_payload(None).unwrap(), Value::Null);
        assert_eq!(parse_payload(Some(r#"{"a":1}"#)).unwrap(), json!({"a": 1}));
        assert_eq!(parse_payload(Some("{")).unwrap_err().code, USAGE);
    }
}
