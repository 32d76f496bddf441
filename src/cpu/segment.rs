use std::fmt;

use crate::cpu::R;

/// segment selection of a memory operand. `Default` resolves to DS,
/// or SS for BP based addressing
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Segment {
    Default,
    CS,
    DS,
    ES,
    SS,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Segment {
    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Default | Segment::DS => "ds",
            Segment::CS => "cs",
            Segment::ES => "es",
            Segment::SS => "ss",
        }
    }

    pub fn as_register(self) -> R {
        match self {
            Segment::Default | Segment::DS => R::DS,
            Segment::CS => R::CS,
            Segment::ES => R::ES,
            Segment::SS => R::SS,
        }
    }

    /// the override prefix byte for this segment
    pub fn prefix_byte(self) -> Option<u8> {
        match self {
            Segment::Default => None,
            Segment::ES => Some(0x26),
            Segment::CS => Some(0x2E),
            Segment::SS => Some(0x36),
            Segment::DS => Some(0x3E),
        }
    }
}
