use lode_core::version::version_string;
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({ "version": lode_core::VERSION, "name": "lode" });
        println!("{value}");
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
