//! Rendering pairing payloads into scannable images.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use qrcode::QrCode;
use qrcode::render::svg;
use tracing::warn;

const DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// Renders `payload` as a QR code SVG wrapped in a base64 data URL.
pub fn render_pairing_code(payload: &str) -> Result<String, qrcode::types::QrError> {
	let code = QrCode::new(payload.as_bytes())?;
	let image = code
		.render::<svg::Color<'_>>()
		.min_dimensions(256, 256)
		.dark_color(svg::Color("#000000"))
		.light_color(svg::Color("#ffffff"))
		.build();
	Ok(format!("{DATA_URL_PREFIX}{}", STANDARD.encode(image)))
}

/// Renders `payload`, falling back to the raw payload if it cannot be encoded.
pub fn pairing_code_or_raw(payload: &str) -> String {
	match render_pairing_code(payload) {
		Ok(code) => code,
		Err(err) => {
			warn!(target = "walink.session", error = %err, "pairing payload could not be rendered; passing it through");
			payload.to_string()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_svg_data_url() {
		let code = render_pairing_code("2@Qx9rLw,abc,def==").unwrap();
		let encoded = code.strip_prefix(DATA_URL_PREFIX).unwrap();
		let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
		assert!(svg.contains("<svg"));
	}

	#[test]
	fn oversized_payload_falls_back_to_raw() {
		let payload = "x".repeat(8_000);
		assert_eq!(pairing_code_or_raw(&payload), payload);
	}
}
