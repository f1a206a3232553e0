//! JSON result envelope shared by the HTTP API and offline commands.

use serde::{Deserialize, Serialize};

/// `{ok, data?, error?}` wrapper around every response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult<T> {
	pub ok: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ApiError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
	pub code: String,
	pub message: String,
}

impl<T> ApiResult<T> {
	pub fn success(data: T) -> Self {
		Self {
			ok: true,
			data: Some(data),
			error: None,
		}
	}

	pub fn failure(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			ok: false,
			data: None,
			error: Some(ApiError {
				code: code.into(),
				message: message.into(),
			}),
		}
	}
}

/// Prints `result` as pretty JSON on stdout.
pub fn print_result<T: Serialize>(result: &ApiResult<T>) {
	match serde_json::to_string_pretty(result) {
		Ok(json) => println!("{json}"),
		Err(err) => eprintln!("failed to serialize result: {err}"),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn success_omits_error() {
		let value = serde_json::to_value(ApiResult::success(json!({"n": 1}))).unwrap();
		assert_eq!(value, json!({"ok": true, "data": {"n": 1}}));
	}

	#[test]
	fn failure_omits_data() {
		let value = serde_json::to_value(ApiResult::<()>::failure("NOT_CONNECTED", "tenant shop is not connected")).unwrap();
		assert_eq!(value["ok"], false);
		assert_eq!(value["error"]["code"], "NOT_CONNECTED");
		assert!(value.get("data").is_none());
	}
}
