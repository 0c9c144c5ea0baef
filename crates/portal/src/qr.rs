//! Entry passes. Every participation carries a payload which is shown to the
//! participant as a QR code and scanned at the attendance desk.

use qrcode::{render::svg, EcLevel, QrCode};

pub const PASS_PREFIX: &str = "PASS:";

pub fn payload(participation_public_id: &str) -> String {
    format!("{PASS_PREFIX}{participation_public_id}")
}

/// Recovers the participation id from a scanned pass. Scanners often append
/// a newline, some report the tag in lower case, and desk staff may type the
/// bare id.
pub fn parse(scanned: &str) -> Option<&str> {
    let scanned = scanned.trim();
    let id = match scanned.get(..PASS_PREFIX.len()) {
        Some(tag) if tag.eq_ignore_ascii_case(PASS_PREFIX) => {
            &scanned[PASS_PREFIX.len()..]
        }
        _ => scanned,
    }
    .trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        None
    } else {
        Some(id)
    }
}

pub fn render_svg(payload: &str) -> Option<String> {
    let code = match QrCode::with_error_correction_level(payload, EcLevel::M) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "could not encode pass as a QR code");
            return None;
        }
    };
    Some(
        code.render()
            .min_dimensions(200, 200)
            .dark_color(svg::Color("#000000"))
            .light_color(svg::Color("#ffffff"))
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_passes_yield_the_participation_id() {
        let id = "0199a1b2-c3d4-7e5f-8a9b-0c1d2e3f4a5b";
        assert_eq!(parse(&payload(id)), Some(id));
        assert_eq!(parse(&format!("{}\n", payload(id))), Some(id));
        assert_eq!(parse(id), Some(id));
        assert_eq!(parse(&format!("pass:{id}")), Some(id));
        assert_eq!(parse(&format!(" Pass: {id}\r\n")), Some(id));
        assert_eq!(parse("PASS:"), None);
        assert_eq!(parse("PASS:two words"), None);
    }

    #[test]
    fn passes_render_as_svg() {
        let svg = render_svg(&payload("abc")).unwrap();
        assert!(svg.contains("<svg"));
    }
}
