//! Claimable resource records as reported by the ledger.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::types::{Address, ResourceId};

/// Raw claim predicate in the ledger's JSON shape.
///
/// Exactly one field is expected to be set per node. Unknown shapes
/// deserialize to an all-empty node, which the resolver reports as
/// unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPredicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unconditional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<RawPredicate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RawPredicate>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<RawPredicate>>,
    /// RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_before: Option<String>,
    /// Unix seconds, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_before_epoch: Option<String>,
    /// Relative seconds, as a decimal string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_before: Option<String>,
}

impl RawPredicate {
    pub fn unconditional() -> Self {
        Self {
            unconditional: Some(true),
            ..Self::default()
        }
    }

    pub fn not(inner: RawPredicate) -> Self {
        Self {
            not: Some(Box::new(inner)),
            ..Self::default()
        }
    }

    pub fn before_epoch(unix_secs: i64) -> Self {
        Self {
            abs_before_epoch: Some(unix_secs.to_string()),
            ..Self::default()
        }
    }

    /// `NOT(BEFORE(t))`: claimable from `t` onwards.
    pub fn not_before_epoch(unix_secs: i64) -> Self {
        Self::not(Self::before_epoch(unix_secs))
    }
}

/// A designated claimant of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: Address,
    pub predicate: RawPredicate,
}

/// A time-locked claimable resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableResource {
    pub id: ResourceId,
    /// Locked amount as reported by the ledger.
    pub amount: Amount,
    /// Asset code ("native" for the ledger's own asset).
    #[serde(default = "default_asset")]
    pub asset: String,
    pub claimants: Vec<Claimant>,
}

fn default_asset() -> String {
    "native".to_string()
}

impl ClaimableResource {
    /// Find the claimant record for `address`.
    pub fn claimant_for(&self, address: &Address) -> Option<&Claimant> {
        self.claimants_for(address).next()
    }

    /// Every claimant record for `address`, in ledger order.
    pub fn claimants_for<'a: 'b, 'b>(
        &'a self,
        address: &'b Address,
    ) -> impl Iterator<Item = &'a Claimant> + 'b {
        self.claimants.iter().filter(move |c| &c.destination == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_predicate_deserializes_ledger_json() {
        let json = r#"{"not":{"abs_before":"2025-03-01T00:00:00Z","abs_before_epoch":"1740787200"}}"#;
        let pred: RawPredicate = serde_json::from_str(json).unwrap();
        let inner = pred.not.unwrap();
        assert_eq!(inner.abs_before_epoch.as_deref(), Some("1740787200"));
    }

    #[test]
    fn test_unknown_predicate_shape_is_empty_node() {
        let pred: RawPredicate = serde_json::from_str(r#"{"something":1}"#).unwrap();
        assert_eq!(pred, RawPredicate::default());
    }

    #[test]
    fn test_claimant_for() {
        let resource = ClaimableResource {
            id: ResourceId::new("00ab"),
            amount: Amount::ZERO,
            asset: "native".to_string(),
            claimants: vec![
                Claimant {
                    destination: Address::new("GOTHER"),
                    predicate: RawPredicate::unconditional(),
                },
                Claimant {
                    destination: Address::new("GME"),
                    predicate: RawPredicate::not_before_epoch(10),
                },
            ],
        };
        let found = resource.claimant_for(&Address::new("GME")).unwrap();
        assert_eq!(found.predicate, RawPredicate::not_before_epoch(10));
        assert!(resource.claimant_for(&Address::new("GNONE")).is_none());
    }

    #[test]
    fn test_claimants_for_yields_every_record() {
        let resource = ClaimableResource {
            id: ResourceId::new("00ab"),
            amount: Amount::ZERO,
            asset: "native".to_string(),
            claimants: vec![
                Claimant {
                    destination: Address::new("GME"),
                    predicate: RawPredicate::before_epoch(10),
                },
                Claimant {
                    destination: Address::new("GOTHER"),
                    predicate: RawPredicate::unconditional(),
                },
                Claimant {
                    destination: Address::new("GME"),
                    predicate: RawPredicate::not_before_epoch(20),
                },
            ],
        };
        let me = Address::new("GME");
        let predicates: Vec<_> = resource.claimants_for(&me).map(|c| &c.predicate).collect();
        assert_eq!(
            predicates,
            vec![
                &RawPredicate::before_epoch(10),
                &RawPredicate::not_before_epoch(20)
            ]
        );
    }
}
