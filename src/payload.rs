/*!
 # Command payloads for the Sunset Lamp

 Every command the lamp understands is a single 16-byte block, encrypted with
 AES-128 in ECB mode under a static key and sent as raw bytes. The encoder
 hands out the hex form of the ciphertext so callers can log and queue it as
 text.
*/

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use tracing::{debug, instrument};

/// Static AES-128 key shared by every lamp of this model
pub const KEY: &[u8; 16] = &[
    0x34, 0x52, 0x2a, 0x5b, 0x7a, 0x6e, 0x49, 0x2c, 0x08, 0x09, 0x0a, 0x9d, 0x8d, 0x2a, 0x23, 0xf8,
];

/// Fixed header at the start of every plaintext block
pub const HEADER: [u8; 4] = [0x54, 0x52, 0x00, 0x57];

/// Group the lamp listens on
pub const GROUP_ID: u8 = 1;

/// Size of a plaintext command, one AES block
pub const PAYLOAD_LEN: usize = 16;

/// Command types understood by the lamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    /// Set a static RGB color with brightness and speed
    Rgb = 2,
}

/// A plaintext command before encryption
///
/// Layout:
/// - Bytes 0-3: header `54 52 00 57`
/// - Byte 4: command type
/// - Byte 5: group id
/// - Bytes 6-7: reserved
/// - Bytes 8-10: red, green, blue
/// - Byte 11: brightness (0-100)
/// - Byte 12: speed (0-100)
/// - Bytes 13-15: zero padding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPayload {
    pub command: CommandType,
    pub rgb: (u8, u8, u8),
    pub brightness: u8,
    pub speed: u8,
}

impl CommandPayload {
    /// RGB command at full brightness and speed
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self {
            command: CommandType::Rgb,
            rgb: (red, green, blue),
            brightness: 100,
            speed: 100,
        }
    }

    pub fn brightness(mut self, brightness: u8) -> Self {
        self.brightness = brightness;
        self
    }

    pub fn speed(mut self, speed: u8) -> Self {
        self.speed = speed;
        self
    }

    /// Lays the command out as a single plaintext block
    pub fn to_bytes(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[..4].copy_from_slice(&HEADER);
        buf[4] = self.command as u8;
        buf[5] = GROUP_ID;
        buf[8] = self.rgb.0;
        buf[9] = self.rgb.1;
        buf[10] = self.rgb.2;
        buf[11] = self.brightness;
        buf[12] = self.speed;
        buf
    }
}

/// Encrypts command payloads with the lamp key
#[derive(Clone)]
pub struct PayloadGenerator {
    cipher: Aes128,
}

impl Default for PayloadGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PayloadGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadGenerator").finish_non_exhaustive()
    }
}

impl PayloadGenerator {
    pub fn new() -> Self {
        Self {
            cipher: Aes128::new(KEY.into()),
        }
    }

    /// Encrypts one payload. ECB with no IV, so equal inputs give equal output.
    pub fn encrypt(&self, payload: &CommandPayload) -> [u8; PAYLOAD_LEN] {
        let mut block = payload.to_bytes();
        self.cipher.encrypt_block((&mut block).into());
        block
    }

    /// Builds, encrypts and hex-encodes an RGB command
    ///
    /// # Arguments
    ///
    /// * `red`, `green`, `blue` - Color components (0-255)
    /// * `brightness` - Brightness level (0-100)
    /// * `speed` - Transition speed (0-100)
    #[instrument(skip(self))]
    pub fn rgb_payload(&self, red: u8, green: u8, blue: u8, brightness: u8, speed: u8) -> String {
        let payload = CommandPayload::rgb(red, green, blue)
            .brightness(brightness)
            .speed(speed);
        let encrypted = self.encrypt(&payload);
        debug!("Encrypted payload: {:02x?}", encrypted);
        hex::encode(encrypted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_red_plaintext_layout() {
        let payload = CommandPayload::rgb(255, 0, 0);
        assert_eq!(
            payload.to_bytes(),
            [
                0x54, 0x52, 0x00, 0x57, 0x02, 0x01, 0x00, 0x00, 0xff, 0x00, 0x00, 0x64, 0x64,
                0x00, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_builders_place_brightness_and_speed() {
        let bytes = CommandPayload::rgb(1, 2, 3).brightness(40).speed(7).to_bytes();
        assert_eq!(&bytes[8..13], &[1, 2, 3, 40, 7]);
        assert_eq!(&bytes[13..], &[0, 0, 0]);
    }

    #[test]
    fn test_known_ciphertexts() {
        let generator = PayloadGenerator::new();
        assert_eq!(
            generator.rgb_payload(255, 0, 0, 100, 100),
            "fd3304e659a8683119b2fda3a4a94b34"
        );
        assert_eq!(
            generator.rgb_payload(255, 255, 255, 100, 100),
            "abde081f78023dff330a8ebcaf268ed3"
        );
        assert_eq!(
            generator.rgb_payload(0, 0, 0, 0, 100),
            "fa10776321fab2158b08664a7dde538c"
        );
    }

    #[test]
    fn test_output_is_32_lowercase_hex_chars() {
        let generator = PayloadGenerator::new();
        for (r, g, b, brightness, speed) in [(0, 0, 0, 0, 0), (12, 200, 99, 50, 1), (255, 255, 255, 100, 100)] {
            let hex = generator.rgb_payload(r, g, b, brightness, speed);
            assert_eq!(hex.len(), 32);
            assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = PayloadGenerator::new().rgb_payload(10, 20, 30, 40, 50);
        let b = PayloadGenerator::new().rgb_payload(10, 20, 30, 40, 50);
        assert_eq!(a, b);
    }
}
