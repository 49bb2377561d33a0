/*!
 # Light entity

 [`LightEntity`] is the capability set a host expects from a light:
 identity, on/off state, brightness, color and the async turn on/off/update
 calls. [`SunsetLamp`] implements it on top of a [`LampController`].
*/

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use tracing::{debug, info, trace};

use crate::color::{hs_to_rgb, scale_brightness};
use crate::connection::LampController;
use crate::payload::PayloadGenerator;

/// Default speed sent with every color command
const DEFAULT_SPEED: u8 = 100;

/// Feature flags a light declares to its host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportedFeatures(u32);

impl SupportedFeatures {
    pub const BRIGHTNESS: SupportedFeatures = SupportedFeatures(1);
    pub const COLOR: SupportedFeatures = SupportedFeatures(16);

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: SupportedFeatures) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for SupportedFeatures {
    type Output = SupportedFeatures;

    fn bitor(self, rhs: SupportedFeatures) -> SupportedFeatures {
        SupportedFeatures(self.0 | rhs.0)
    }
}

/// Optional attributes passed to [`LightEntity::turn_on`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TurnOnParams {
    /// Brightness (0-255)
    pub brightness: Option<u8>,
    /// Hue (0-360) and saturation (0-100)
    pub hs_color: Option<(f64, f64)>,
}

impl TurnOnParams {
    pub fn brightness(mut self, brightness: u8) -> Self {
        self.brightness = Some(brightness);
        self
    }

    pub fn hs_color(mut self, hue: f64, saturation: f64) -> Self {
        self.hs_color = Some((hue, saturation));
        self
    }
}

/// In-memory state of a light, not persisted across restarts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub is_on: bool,
    pub brightness: u8,
    pub hs_color: (f64, f64),
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            is_on: false,
            brightness: 255,
            hs_color: (0.0, 0.0),
        }
    }
}

/// Capabilities a host light platform relies on
pub trait LightEntity: Send + Sync {
    /// Display name
    fn name(&self) -> &str;

    /// Stable id used by the host entity registry
    fn unique_id(&self) -> String;

    fn is_on(&self) -> bool;

    /// Brightness (0-255)
    fn brightness(&self) -> u8;

    /// Hue (0-360) and saturation (0-100)
    fn hs_color(&self) -> (f64, f64);

    fn supported_features(&self) -> SupportedFeatures;

    fn turn_on(&self, params: TurnOnParams) -> BoxFuture<'_, ()>;

    fn turn_off(&self) -> BoxFuture<'_, ()>;

    /// Refreshes state from the device
    fn update(&self) -> BoxFuture<'_, ()>;
}

/// Representation of a Sunset Lamp as a light entity
pub struct SunsetLamp {
    name: String,
    controller: Arc<LampController>,
    state: Mutex<LightState>,
    payload_generator: PayloadGenerator,
}

impl fmt::Debug for SunsetLamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SunsetLamp")
            .field("name", &self.name)
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl SunsetLamp {
    pub fn new(controller: Arc<LampController>, name: &str) -> Self {
        Self {
            name: name.to_string(),
            controller,
            state: Mutex::new(LightState::default()),
            payload_generator: PayloadGenerator::new(),
        }
    }

    pub fn controller(&self) -> &Arc<LampController> {
        &self.controller
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LightState {
        *self.state.lock()
    }
}

impl LightEntity for SunsetLamp {
    fn name(&self) -> &str {
        &self.name
    }

    fn unique_id(&self) -> String {
        format!("{}_{}", crate::DOMAIN, self.name.to_lowercase().replace(' ', "_"))
    }

    fn is_on(&self) -> bool {
        self.state.lock().is_on
    }

    fn brightness(&self) -> u8 {
        self.state.lock().brightness
    }

    fn hs_color(&self) -> (f64, f64) {
        self.state.lock().hs_color
    }

    fn supported_features(&self) -> SupportedFeatures {
        SupportedFeatures::COLOR | SupportedFeatures::BRIGHTNESS
    }

    fn turn_on(&self, params: TurnOnParams) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let (hue, saturation, brightness) = {
                let mut state = self.state.lock();
                state.is_on = true;
                if let Some(brightness) = params.brightness {
                    state.brightness = brightness;
                }
                if let Some(hs_color) = params.hs_color {
                    state.hs_color = hs_color;
                }
                (state.hs_color.0, state.hs_color.1, state.brightness)
            };

            let (r, g, b) = hs_to_rgb(hue, saturation);
            let brightness = scale_brightness(brightness);
            debug!("Turning on with RGB({}, {}, {}) at {}%", r, g, b, brightness);

            let command = self
                .payload_generator
                .rgb_payload(r, g, b, brightness, DEFAULT_SPEED);
            self.controller.send_command(&command).await;
            info!("{} turned on", self.name);
        })
    }

    fn turn_off(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.state.lock().is_on = false;

            // The lamp has no dedicated off command: black at zero brightness
            let command = self.payload_generator.rgb_payload(0, 0, 0, 0, DEFAULT_SPEED);
            self.controller.send_command(&command).await;
            info!("{} turned off", self.name);
        })
    }

    fn update(&self) -> BoxFuture<'_, ()> {
        // The lamp exposes no state to poll
        trace!("Nothing to update for {}", self.name);
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockState, MockTransport};
    use crate::payload::CommandPayload;

    fn lamp(name: &str) -> (SunsetLamp, Arc<MockState>) {
        let (transport, state) = MockTransport::new();
        let controller = Arc::new(LampController::new("AA:BB:CC:DD:EE:FF", Box::new(transport)));
        (SunsetLamp::new(controller, name), state)
    }

    fn encrypted(payload: CommandPayload) -> Vec<u8> {
        PayloadGenerator::new().encrypt(&payload).to_vec()
    }

    #[test]
    fn test_defaults() {
        let (lamp, _) = lamp("Sunset Lamp");
        assert!(!lamp.is_on());
        assert_eq!(lamp.brightness(), 255);
        assert_eq!(lamp.hs_color(), (0.0, 0.0));
    }

    #[test]
    fn test_unique_id_is_slugified_name() {
        let (lamp, _) = lamp("Living Room Lamp");
        assert_eq!(lamp.unique_id(), "sunset_lamp_living_room_lamp");
    }

    #[test]
    fn test_supported_features() {
        let (lamp, _) = lamp("Sunset Lamp");
        let features = lamp.supported_features();
        assert!(features.contains(SupportedFeatures::COLOR));
        assert!(features.contains(SupportedFeatures::BRIGHTNESS));
        assert_eq!(features.bits(), 17);
    }

    #[tokio::test]
    async fn test_turn_on_defaults_to_full_white() {
        let (lamp, mock) = lamp("Sunset Lamp");
        lamp.turn_on(TurnOnParams::default()).await;
        assert!(lamp.is_on());
        assert_eq!(
            mock.written(),
            vec![encrypted(CommandPayload::rgb(255, 255, 255))]
        );
    }

    #[tokio::test]
    async fn test_turn_on_merges_params() {
        let (lamp, mock) = lamp("Sunset Lamp");
        lamp.turn_on(TurnOnParams::default().hs_color(0.0, 100.0)).await;
        lamp.turn_on(TurnOnParams::default().brightness(128)).await;

        assert_eq!(lamp.hs_color(), (0.0, 100.0));
        assert_eq!(lamp.brightness(), 128);
        assert_eq!(
            mock.written()[1],
            encrypted(CommandPayload::rgb(255, 0, 0).brightness(50))
        );
    }

    #[tokio::test]
    async fn test_turn_off_sends_black_at_zero_brightness() {
        let (lamp, mock) = lamp("Sunset Lamp");
        lamp.turn_on(TurnOnParams::default().brightness(200)).await;
        lamp.turn_off().await;

        assert!(!lamp.is_on());
        // Brightness is remembered for the next turn_on
        assert_eq!(lamp.brightness(), 200);
        assert_eq!(
            mock.written()[1],
            encrypted(CommandPayload::rgb(0, 0, 0).brightness(0))
        );
    }

    #[tokio::test]
    async fn test_update_sends_nothing() {
        let (lamp, mock) = lamp("Sunset Lamp");
        lamp.update().await;
        assert_eq!(mock.connects(), 0);
        assert!(mock.written().is_empty());
    }
}
