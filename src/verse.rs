use crate::alignment::AlignmentBridge;
use crate::models::TestScore;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle of a verse, always derived from its content
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum VerseState {
    #[default]
    NoSource,
    NoTarget,
    Unaligned,
    AlignedTrain,
    AlignedTest,
}

impl VerseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerseState::NoSource => "no-source",
            VerseState::NoTarget => "no-target",
            VerseState::Unaligned => "unaligned",
            VerseState::AlignedTrain => "aligned-train",
            VerseState::AlignedTest => "aligned-test",
        }
    }
}

impl fmt::Display for VerseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Verse {
    #[serde(skip)]
    state: VerseState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source_verse: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_verse: Option<Value>,
    #[serde(default)]
    reserved_for_testing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    test_score: Option<TestScore>,
}

impl Verse {
    pub fn new() -> Self {
        Verse::default()
    }

    pub fn state(&self) -> VerseState {
        self.state
    }

    pub fn source_verse(&self) -> Option<&Value> {
        self.source_verse.as_ref()
    }

    pub fn target_verse(&self) -> Option<&Value> {
        self.target_verse.as_ref()
    }

    pub fn reserved_for_testing(&self) -> bool {
        self.reserved_for_testing
    }

    pub fn test_score(&self) -> Option<&TestScore> {
        self.test_score.as_ref()
    }

    pub fn add_target_usfm(&self, usfm_verse: Value, bridge: &dyn AlignmentBridge) -> Verse {
        Verse {
            target_verse: Some(usfm_verse),
            ..self.clone()
        }
        .recompute(bridge)
    }

    pub fn add_source_usfm(&self, usfm_verse: Value, bridge: &dyn AlignmentBridge) -> Verse {
        Verse {
            source_verse: Some(usfm_verse),
            ..self.clone()
        }
        .recompute(bridge)
    }

    pub fn set_reserved_for_testing(&self, reserved: bool, bridge: &dyn AlignmentBridge) -> Verse {
        Verse {
            reserved_for_testing: reserved,
            ..self.clone()
        }
        .recompute(bridge)
    }

    pub fn with_test_score(&self, score: TestScore) -> Verse {
        Verse {
            test_score: Some(score),
            ..self.clone()
        }
    }

    /// Re-derives `state` from the current content
    pub fn recompute(mut self, bridge: &dyn AlignmentBridge) -> Verse {
        self.state = self.compute_state(bridge);
        self
    }

    pub fn compute_state(&self, bridge: &dyn AlignmentBridge) -> VerseState {
        let Some(source) = &self.source_verse else {
            return VerseState::NoSource;
        };
        let Some(target) = &self.target_verse else {
            return VerseState::NoTarget;
        };
        if !bridge.is_alignment_complete(source, target) {
            VerseState::Unaligned
        } else if self.reserved_for_testing {
            VerseState::AlignedTest
        } else {
            VerseState::AlignedTrain
        }
    }

    pub fn list_headers() -> Vec<String> {
        vec!["Verse".to_string(), "State".to_string()]
    }

    pub fn list_row(&self, verse_num: u32) -> (Vec<String>, Vec<String>) {
        (
            vec![verse_num.to_string(), self.state.to_string()],
            vec![verse_num.to_string()],
        )
    }
}
