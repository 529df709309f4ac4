use schemars::schema_for;
use stratus_manifest::StratusConfig;

fn main() -> anyhow::Result<()> {
    let schema = schema_for!(StratusConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
