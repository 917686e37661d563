//! Clearance bitmask model
//!
//! An account's capabilities are stored as a single integer where each bit
//! grants one capability. Masks combine with `grant` (bitwise OR) and shed
//! capabilities with `revoke` (bitwise AND NOT).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer-backed set of account capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clearance(i64);

impl Clearance {
    /// Regular employee: may submit and view their own receipts
    pub const USER: Clearance = Clearance(1);
    /// Finance role: may review, approve, reject, and archive receipts
    pub const CFO: Clearance = Clearance(2);
    /// Account administration
    pub const ADMIN: Clearance = Clearance(4);

    const NAMED: [(Clearance, &'static str); 3] = [
        (Clearance::USER, "User"),
        (Clearance::CFO, "CFO"),
        (Clearance::ADMIN, "Admin"),
    ];

    /// Reconstruct a mask from its stored integer value
    pub fn from_bits(bits: i64) -> Self {
        Clearance(bits)
    }

    /// The stored integer value of this mask
    pub fn bits(self) -> i64 {
        self.0
    }

    /// Whether this mask holds the given capability
    pub fn contains(self, capability: Clearance) -> bool {
        self.0 & capability.0 != 0
    }

    /// Add a capability to the mask
    pub fn grant(self, capability: Clearance) -> Self {
        Clearance(self.0 | capability.0)
    }

    /// Remove a capability from the mask
    pub fn revoke(self, capability: Clearance) -> Self {
        Clearance(self.0 & !capability.0)
    }

    /// All non-empty capability combinations, used to seed the `user_types`
    /// reference table
    pub fn all_combinations() -> Vec<Clearance> {
        let full: i64 = Self::NAMED.iter().map(|(c, _)| c.0).sum();
        (1..=full).filter(|bits| bits & !full == 0).map(Clearance).collect()
    }
}

impl fmt::Display for Clearance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (capability, name) in Self::NAMED {
            if self.contains(capability) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        if first {
            write!(f, "None")?;
        }
        Ok(())
    }
}

impl FromStr for Clearance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMED
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|(capability, _)| *capability)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let mask = Clearance::USER.grant(Clearance::ADMIN);
        assert!(mask.contains(Clearance::USER));
        assert!(mask.contains(Clearance::ADMIN));
        assert!(!mask.contains(Clearance::CFO));
    }

    #[test]
    fn test_grant_revoke_round_trip() {
        // Granting and revoking a capability restores the original mask for
        // every possible starting mask.
        for bits in 0..8 {
            let mask = Clearance::from_bits(bits);
            let without_cfo = mask.revoke(Clearance::CFO);
            assert_eq!(without_cfo.grant(Clearance::CFO).revoke(Clearance::CFO), without_cfo);
            if !mask.contains(Clearance::CFO) {
                assert_eq!(mask.grant(Clearance::CFO).revoke(Clearance::CFO), mask);
            }
        }
    }

    #[test]
    fn test_all_combinations() {
        let combinations = Clearance::all_combinations();
        assert_eq!(combinations.len(), 7);
        assert!(combinations.contains(&Clearance::USER.grant(Clearance::CFO).grant(Clearance::ADMIN)));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Clearance::USER.to_string(), "User");
        assert_eq!(Clearance::USER.grant(Clearance::ADMIN).to_string(), "User|Admin");
        assert_eq!(Clearance::from_bits(0).to_string(), "None");
    }

    #[test]
    fn test_parse() {
        assert_eq!("cfo".parse::<Clearance>().unwrap(), Clearance::CFO);
        assert!("owner".parse::<Clearance>().is_err());
    }
}
