use htrpc_peer::GET_ALL_SCHEMAS;
use serde_json::Value;

use crate::cmd::{connect, SchemasArgs, REMOTE};
use crate::exit::{rpc_error, CliResult, SUCCESS};
use crate::output::{print_schemas, OutputFormat};

pub async fn run(args: SchemasArgs, format: OutputFormat) -> CliResult<i32> {
    let client = connect(&args.endpoint).await?;
    let result = client.call(REMOTE, GET_ALL_SCHEMAS, Value::Null).await;
    let _ = client.disconnect().await;

    let schemas = result.map_err(|err| rpc_error("schema listing failed", err))?;
    print_schemas(&schemas, format);
    Ok(SUCCESS)
}
