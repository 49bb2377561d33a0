//! Color helpers shared by the light entity.

/// Converts a hue/saturation pair to RGB at full value.
///
/// `hue` is in degrees (0-360) and `saturation` in percent (0-100). Channels
/// are truncated, so (0, 50) gives (255, 127, 127).
pub fn hs_to_rgb(hue: f64, saturation: f64) -> (u8, u8, u8) {
    let h = hue / 360.0;
    let s = (saturation / 100.0).clamp(0.0, 1.0);
    let v = 1.0;

    if s == 0.0 {
        return (255, 255, 255);
    }

    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (channel(r), channel(g), channel(b))
}

fn channel(value: f64) -> u8 {
    (value * 255.0) as u8
}

/// Scales an entity brightness (0-255) to the lamp's percent range (0-100)
pub fn scale_brightness(brightness: u8) -> u8 {
    (brightness as f64 / 255.0 * 100.0) as u8
}
