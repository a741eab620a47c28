// crates/types/src/intent.rs
//! Named intents raised by the tray, menus or the frontend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// The event name an intent listener registers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
pub enum IntentKind {
    #[serde(rename = "start-tilt")]
    Start,
    #[serde(rename = "stop-tilt")]
    Stop,
    #[serde(rename = "restart-tilt")]
    Restart,
    #[serde(rename = "open-service-in-editor")]
    OpenInEditor,
}

impl IntentKind {
    pub const ALL: [IntentKind; 4] = [
        IntentKind::Start,
        IntentKind::Stop,
        IntentKind::Restart,
        IntentKind::OpenInEditor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IntentKind::Start => "start-tilt",
            IntentKind::Stop => "stop-tilt",
            IntentKind::Restart => "restart-tilt",
            IntentKind::OpenInEditor => "open-service-in-editor",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown intent: {0:?}")]
pub struct UnknownIntent(pub String);

impl FromStr for IntentKind {
    type Err = UnknownIntent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IntentKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| UnknownIntent(s.to_string()))
    }
}

/// An intent with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../src/types/generated/"))]
#[serde(tag = "intent")]
pub enum Intent {
    #[serde(rename = "start-tilt")]
    Start,
    #[serde(rename = "stop-tilt")]
    Stop,
    #[serde(rename = "restart-tilt")]
    Restart,
    #[serde(rename = "open-service-in-editor")]
    OpenInEditor { service: String },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::Start => IntentKind::Start,
            Intent::Stop => IntentKind::Stop,
            Intent::Restart => IntentKind::Restart,
            Intent::OpenInEditor { .. } => IntentKind::OpenInEditor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kind_names_round_trip_through_from_str() {
        for kind in IntentKind::ALL {
            assert_eq!(kind.name().parse::<IntentKind>(), Ok(kind));
        }
        assert!("launch-tilt".parse::<IntentKind>().is_err());
    }

    #[test]
    fn intent_payload_shape() {
        let intent: Intent = serde_json::from_value(serde_json::json!({
            "intent": "open-service-in-editor",
            "service": "api",
        }))
        .unwrap();
        assert_eq!(
            intent,
            Intent::OpenInEditor {
                service: "api".into()
            }
        );
        assert_eq!(intent.kind(), IntentKind::OpenInEditor);

        let stop: Intent = serde_json::from_str(r#"{"intent":"stop-tilt"}"#).unwrap();
        assert_eq!(stop.kind(), IntentKind::Stop);
    }
}
