//! `spotctl run`: Execute one action through the engine.

use serde_json::Value;
use spotctl_config::AppConfig;
use spotctl_core::context::AIContext;

use crate::session;

pub async fn run(action: &str, params: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let parameters = parse_params(params)?;

    let engine = session::engine(&config)?;
    let mut context = AIContext::new(session::remote_auth(&config));
    session::initialize(&engine, &context);

    let result = engine
        .execute_action(action, &mut context, parameters, None)
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    session::save_refreshed_tokens(&config, &context)?;
    if !result.success {
        return Err(format!("Action '{action}' failed").into());
    }
    Ok(())
}

fn parse_params(params: Option<&str>) -> Result<Value, String> {
    let Some(raw) = params else {
        return Ok(Value::Object(Default::default()));
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err("--params must be a JSON object".into()),
        Err(e) => Err(format!("--params is not valid JSON: {e}")),
    }
}
