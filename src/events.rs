// src/events.rs
//
// Wire types for the control surface: inbound commands and outbound
// events. Field names follow the payloads the chart/log front-end already
// consumes, so a late-joining observer can reconstruct its view from the
// init snapshot plus the event stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Hyperparams;

/// Inbound control command, e.g. `{"cmd":"setParams","params":{"ALPHA":0.5}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    Start,
    Pause,
    Reset,
    SetParams {
        #[serde(default)]
        params: Value,
    },
}

/// Outbound event broadcast to observers (or unicast where noted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Event {
    /// Unicast on observer connect: everything needed to rebuild state.
    Init(InitPayload),
    /// Broadcast every tick.
    Update(UpdatePayload),
    /// Broadcast on every Nth closed episode and on the final episode.
    EpisodeLog(EpisodeLogPayload),
    /// Broadcast once per run when the episode target is reached.
    TrainingComplete(TrainingCompletePayload),
    /// Broadcast after a reset.
    ResetComplete(ResetCompletePayload),
    /// Unicast acknowledgement of a setParams command.
    ParamsUpdated(Hyperparams),
    /// Broadcast acknowledgement of a start command.
    Started,
    /// Broadcast acknowledgement of a pause command.
    Paused,
}

impl Event {
    /// Wire tag of this event, as serialized into the `event` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Init(_) => "init",
            Event::Update(_) => "update",
            Event::EpisodeLog(_) => "episodeLog",
            Event::TrainingComplete(_) => "trainingComplete",
            Event::ResetComplete(_) => "resetComplete",
            Event::ParamsUpdated(_) => "paramsUpdated",
            Event::Started => "started",
            Event::Paused => "paused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPayload {
    #[serde(flatten)]
    pub hyper: Hyperparams,
    pub current_episode: u32,
    pub rewards: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePayload {
    pub state: f64,
    /// Action index: 0 = decrease, 1 = hold, 2 = increase.
    pub action: usize,
    pub current_episode: u32,
    pub step_in_episode: u32,
    pub rewards: Vec<f64>,
    /// Q-table row for the current state bucket only, to keep the payload
    /// small.
    pub q_sample: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeLogPayload {
    pub episode: u32,
    /// Average reward formatted to 3 decimals.
    pub avg_reward: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingCompletePayload {
    pub current_episode: u32,
    pub rewards: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetCompletePayload {
    pub current_episode: u32,
    pub rewards: Vec<f64>,
    pub state: f64,
}

/// Synchronous status snapshot served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub running: bool,
    pub current_episode: u32,
    pub step_in_episode: u32,
    pub state: f64,
    pub action: usize,
    pub rewards_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: Command = serde_json::from_str(r#"{"cmd":"start"}"#).unwrap();
        assert!(matches!(cmd, Command::Start));

        let cmd: Command =
            serde_json::from_str(r#"{"cmd":"setParams","params":{"ALPHA":0.3}}"#).unwrap();
        match cmd {
            Command::SetParams { params } => {
                assert_eq!(params.get("ALPHA").and_then(Value::as_f64), Some(0.3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn set_params_without_payload_defaults_to_null() {
        let cmd: Command = serde_json::from_str(r#"{"cmd":"setParams"}"#).unwrap();
        assert!(matches!(cmd, Command::SetParams { params: Value::Null }));
    }

    #[test]
    fn events_carry_wire_field_names() {
        let event = Event::Update(UpdatePayload {
            state: 55.0,
            action: 1,
            current_episode: 2,
            step_in_episode: 7,
            rewards: vec![-1.5],
            q_sample: vec![0.0, 0.1, 0.2],
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "update");
        assert_eq!(json["data"]["currentEpisode"], 2);
        assert_eq!(json["data"]["stepInEpisode"], 7);
        assert_eq!(json["data"]["qSample"][2], 0.2);
    }

    #[test]
    fn init_payload_flattens_hyperparams() {
        let event = Event::Init(InitPayload {
            hyper: Hyperparams::default(),
            current_episode: 0,
            rewards: vec![],
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "init");
        assert_eq!(json["data"]["ALPHA"], 0.1);
        assert_eq!(json["data"]["NUM_EPISODES"], 100);
        assert_eq!(json["data"]["currentEpisode"], 0);
    }

    #[test]
    fn unit_events_serialize_without_payload() {
        let json = serde_json::to_value(Event::Started).unwrap();
        assert_eq!(json["event"], "started");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn kind_agrees_with_serialized_tag() {
        let events = [
            Event::Started,
            Event::Paused,
            Event::ParamsUpdated(Hyperparams::default()),
            Event::EpisodeLog(EpisodeLogPayload {
                episode: 5,
                avg_reward: "-12.345".to_string(),
            }),
            Event::TrainingComplete(TrainingCompletePayload {
                current_episode: 100,
                rewards: vec![],
            }),
            Event::ResetComplete(ResetCompletePayload {
                current_episode: 0,
                rewards: vec![],
                state: 42.0,
            }),
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event"], event.kind());
        }
    }
}
