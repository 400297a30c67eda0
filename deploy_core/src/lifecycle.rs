//! World lifecycle: `Absent -> Created -> Started -> Connected`.
//!
//! The wire protocol carries an action bitmask (Create=1, Start=2,
//! Connect=4). Callers never assemble that mask by hand: it is derived from
//! the stage a world should reach, so only monotonic prefixes (1, 3, 7)
//! can exist.

use crate::config::{InitializationMode, WorldAction};
use crate::protocol::ProtocolError;
use serde::{Deserialize, Serialize};

/// Where a world is along its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum WorldStage {
    #[default]
    Absent,
    Created,
    Started,
    Connected,
}

/// A single step along the lifecycle chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    Create,
    Start,
    Connect,
    Stop,
}

impl Transition {
    /// Stage reached after applying this transition.
    pub fn result(self) -> WorldStage {
        match self {
            Transition::Create => WorldStage::Created,
            Transition::Start => WorldStage::Started,
            Transition::Connect => WorldStage::Connected,
            Transition::Stop => WorldStage::Absent,
        }
    }
}

impl WorldStage {
    /// Minimal transitions needed to reach `target` from `self`.
    ///
    /// Worlds only move forward one stage at a time, or drop back to
    /// `Absent` through `Stop`. A target at or below the current stage
    /// (other than `Absent`) needs nothing.
    pub fn transitions_to(self, target: WorldStage) -> Vec<Transition> {
        if target == WorldStage::Absent {
            return if self == WorldStage::Absent {
                Vec::new()
            } else {
                vec![Transition::Stop]
            };
        }
        
        [Transition::Create, Transition::Start, Transition::Connect]
            .into_iter()
            .filter(|step| step.result() > self && step.result() <= target)
            .collect()
    }
    
    /// Applies a transition, returning the new stage.
    ///
    /// Returns `None` when the transition would skip a stage.
    pub fn apply(self, transition: Transition) -> Option<WorldStage> {
        let next = transition.result();
        let valid = match transition {
            Transition::Stop => true,
            Transition::Create => self == WorldStage::Absent,
            Transition::Start => self == WorldStage::Created,
            Transition::Connect => self == WorldStage::Started,
        };
        valid.then_some(next)
    }
}

impl From<InitializationMode> for WorldStage {
    fn from(mode: InitializationMode) -> Self {
        match mode {
            InitializationMode::Create => WorldStage::Created,
            InitializationMode::Start => WorldStage::Started,
            InitializationMode::Connect => WorldStage::Connected,
        }
    }
}

impl From<WorldAction> for WorldStage {
    fn from(action: WorldAction) -> Self {
        match action {
            WorldAction::Stop => WorldStage::Absent,
            WorldAction::Start => WorldStage::Started,
            WorldAction::Connect => WorldStage::Connected,
        }
    }
}

/// Wire form of a configuration command's actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ActionMask(u8);

impl ActionMask {
    pub const CREATE: u8 = 1;
    pub const START: u8 = 2;
    pub const CONNECT: u8 = 4;
    
    /// Mask that brings an absent world up to `mode`.
    pub fn for_mode(mode: InitializationMode) -> Self {
        match mode {
            InitializationMode::Create => Self(Self::CREATE),
            InitializationMode::Start => Self(Self::CREATE | Self::START),
            InitializationMode::Connect => Self(Self::CREATE | Self::START | Self::CONNECT),
        }
    }
    
    pub fn bits(self) -> u8 {
        self.0
    }
    
    pub fn creates(self) -> bool {
        self.0 & Self::CREATE != 0
    }
    
    pub fn starts(self) -> bool {
        self.0 & Self::START != 0
    }
    
    pub fn connects(self) -> bool {
        self.0 & Self::CONNECT != 0
    }
    
    /// Stage a world reaches once every bit in the mask is honored.
    pub fn target_stage(self) -> WorldStage {
        if self.connects() {
            WorldStage::Connected
        } else if self.starts() {
            WorldStage::Started
        } else {
            WorldStage::Created
        }
    }
}

impl From<InitializationMode> for ActionMask {
    fn from(mode: InitializationMode) -> Self {
        Self::for_mode(mode)
    }
}

impl From<ActionMask> for u8 {
    fn from(mask: ActionMask) -> u8 {
        mask.0
    }
}

impl TryFrom<u8> for ActionMask {
    type Error = ProtocolError;
    
    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            1 | 3 | 7 => Ok(Self(bits)),
            other => Err(ProtocolError::InvalidActionMask(other)),
        }
    }
}
