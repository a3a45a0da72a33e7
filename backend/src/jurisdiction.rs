//! Jurisdiction registry with monotonic power-of-two mask allocation.
//!
//! The active set is a dense `Vec` of codes plus a code -> position map; removal swaps the
//! last element into the freed slot, so listing order is not stable.

use crate::errors::EngineError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;
use zk_circuits::constants::JURISDICTION_SLOTS;

/// Mask bits available to the registry.
pub const MAX_JURISDICTIONS: u32 = u64::BITS;

const MAX_CODE_LEN: usize = 16;
const MAX_NAME_LEN: usize = 128;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub name: String,
    pub code: String,
    pub mask: u64,
    pub active: bool,
    pub created_at: u64,
}

impl Jurisdiction {
    /// Index of the single bit set in `mask`; this is the code the eligibility circuit sees.
    pub fn bit_index(&self) -> u32 {
        self.mask.trailing_zeros()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveJurisdiction {
    pub mask: u64,
    pub name: String,
    pub code: String,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Jurisdiction>,
    active: Vec<String>,
    position: HashMap<String, usize>,
    next_bit: u32,
}

impl Inner {
    fn activate(&mut self, code: &str) {
        self.position.insert(code.to_string(), self.active.len());
        self.active.push(code.to_string());
    }

    fn deactivate(&mut self, code: &str) {
        let Some(pos) = self.position.remove(code) else { return };
        self.active.swap_remove(pos);
        if let Some(moved) = self.active.get(pos) {
            self.position.insert(moved.clone(), pos);
        }
    }
}

#[derive(Debug, Default)]
pub struct JurisdictionRegistry {
    inner: RwLock<Inner>,
}

fn validate(name: &str, code: &str) -> Result<(), EngineError> {
    if code.is_empty() || code.len() > MAX_CODE_LEN {
        return Err(EngineError::InvalidJurisdiction(format!("code must be 1..={MAX_CODE_LEN} characters")));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(EngineError::InvalidJurisdiction(format!("code {code:?} has invalid characters")));
    }
    if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
        return Err(EngineError::InvalidJurisdiction(format!("name must be 1..={MAX_NAME_LEN} characters")));
    }
    Ok(())
}

impl JurisdictionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `code` under the next unused mask bit.
    pub fn add(&self, name: &str, code: &str, now: u64) -> Result<Jurisdiction, EngineError> {
        validate(name, code)?;
        let mut inner = self.inner.write();
        if inner.entries.contains_key(code) {
            return Err(EngineError::JurisdictionExists(code.to_string()));
        }
        if inner.next_bit >= MAX_JURISDICTIONS {
            return Err(EngineError::JurisdictionCapacityExhausted);
        }

        let entry = Jurisdiction {
            name: name.to_string(),
            code: code.to_string(),
            mask: 1u64 << inner.next_bit,
            active: true,
            created_at: now,
        };
        inner.next_bit += 1;
        inner.entries.insert(code.to_string(), entry.clone());
        inner.activate(code);

        info!(code, mask = entry.mask, "jurisdiction added");
        Ok(entry)
    }

    /// Deactivate `code`. The mask stays allocated.
    pub fn remove(&self, code: &str) -> Result<(), EngineError> {
        self.set_active(code, false).map(|_| ()).map_err(|e| match e {
            EngineError::JurisdictionStatusUnchanged { code, .. } => EngineError::JurisdictionNotFound(code),
            other => other,
        })
    }

    pub fn set_active(&self, code: &str, active: bool) -> Result<Jurisdiction, EngineError> {
        let mut inner = self.inner.write();
        let entry = inner
            .entries
            .get_mut(code)
            .ok_or_else(|| EngineError::JurisdictionNotFound(code.to_string()))?;
        if entry.active == active {
            return Err(EngineError::JurisdictionStatusUnchanged { code: code.to_string(), active });
        }
        entry.active = active;
        let updated = entry.clone();

        if active {
            inner.activate(code);
        } else {
            inner.deactivate(code);
        }
        info!(code, active, "jurisdiction status changed");
        Ok(updated)
    }

    pub fn get(&self, code: &str) -> Option<Jurisdiction> {
        self.inner.read().entries.get(code).cloned()
    }

    pub fn list_active(&self) -> Vec<ActiveJurisdiction> {
        let inner = self.inner.read();
        inner
            .active
            .iter()
            .filter_map(|code| inner.entries.get(code))
            .map(|j| ActiveJurisdiction { mask: j.mask, name: j.name.clone(), code: j.code.clone() })
            .collect()
    }

    /// Union of active masks restricted to the bits the eligibility circuit can address.
    pub fn allowed_mask(&self) -> u64 {
        let circuit_bits = (1u64 << JURISDICTION_SLOTS) - 1;
        self.list_active().iter().fold(0, |acc, j| acc | j.mask) & circuit_bits
    }

    /// Circuit-side code for an active jurisdiction, if it fits the circuit's slots.
    pub fn circuit_code(&self, code: &str) -> Option<u64> {
        let entry = self.get(code)?;
        let bit = entry.bit_index();
        (entry.active && (bit as usize) < JURISDICTION_SLOTS).then_some(u64::from(bit))
    }

    /// Restore persisted entries. Masks stay monotonic past every restored bit.
    pub fn hydrate(&self, entries: impl IntoIterator<Item = Jurisdiction>) {
        let mut inner = self.inner.write();
        let mut restored: Vec<Jurisdiction> = entries.into_iter().collect();
        restored.sort_by_key(|j| j.mask);
        for entry in restored {
            inner.next_bit = inner.next_bit.max(entry.bit_index() + 1);
            let code = entry.code.clone();
            let active = entry.active;
            inner.entries.insert(code.clone(), entry);
            if active && !inner.position.contains_key(&code) {
                inner.activate(&code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_are_monotonic_powers_of_two() {
        let registry = JurisdictionRegistry::new();
        let us = registry.add("United States", "US", 1).unwrap();
        let eu = registry.add("European Union", "EU", 2).unwrap();
        assert_eq!((us.mask, eu.mask), (1, 2));

        registry.remove("US").unwrap();
        let sg = registry.add("Singapore", "SG", 3).unwrap();
        assert_eq!(sg.mask, 4);
    }

    #[test]
    fn codes_are_unique_even_after_removal() {
        let registry = JurisdictionRegistry::new();
        registry.add("United States", "US", 0).unwrap();
        assert_eq!(registry.add("Other", "US", 0).unwrap_err(), EngineError::JurisdictionExists("US".into()));
        registry.remove("US").unwrap();
        assert_eq!(registry.add("Other", "US", 0).unwrap_err(), EngineError::JurisdictionExists("US".into()));
    }

    #[test]
    fn remove_and_toggle_maintain_the_active_index() {
        let registry = JurisdictionRegistry::new();
        for (i, code) in ["A", "B", "C", "D"].into_iter().enumerate() {
            registry.add(code, code, i as u64).unwrap();
        }
        registry.remove("A").unwrap();
        let mut codes: Vec<String> = registry.list_active().into_iter().map(|j| j.code).collect();
        codes.sort();
        assert_eq!(codes, vec!["B", "C", "D"]);
        assert_eq!(registry.allowed_mask(), 0b1110);

        assert_eq!(registry.remove("A").unwrap_err(), EngineError::JurisdictionNotFound("A".into()));
        assert_eq!(registry.remove("Z").unwrap_err(), EngineError::JurisdictionNotFound("Z".into()));
        assert_eq!(
            registry.set_active("B", true).unwrap_err(),
            EngineError::JurisdictionStatusUnchanged { code: "B".into(), active: true }
        );

        registry.set_active("A", true).unwrap();
        registry.set_active("C", false).unwrap();
        assert_eq!(registry.allowed_mask(), 0b1011);
        assert_eq!(registry.list_active().len(), 3);
        assert_eq!(registry.circuit_code("D"), Some(3));
        assert_eq!(registry.circuit_code("C"), None);
    }

    #[test]
    fn capacity_is_bounded_by_mask_width() {
        let registry = JurisdictionRegistry::new();
        for i in 0..MAX_JURISDICTIONS {
            registry.add("j", &format!("J{i}"), 0).unwrap();
        }
        assert_eq!(registry.add("j", "LAST", 0).unwrap_err(), EngineError::JurisdictionCapacityExhausted);
        // Only the low bits reach the circuit.
        assert_eq!(registry.allowed_mask(), 0xFFFF);
    }

    #[test]
    fn invalid_codes_are_rejected() {
        let registry = JurisdictionRegistry::new();
        assert!(matches!(registry.add("x", "", 0), Err(EngineError::InvalidJurisdiction(_))));
        assert!(matches!(registry.add("x", "U S", 0), Err(EngineError::InvalidJurisdiction(_))));
        assert!(matches!(registry.add(" ", "US", 0), Err(EngineError::InvalidJurisdiction(_))));
    }

    #[test]
    fn hydrate_keeps_allocation_monotonic() {
        let registry = JurisdictionRegistry::new();
        registry.hydrate([
            Jurisdiction { name: "a".into(), code: "A".into(), mask: 1, active: false, created_at: 0 },
            Jurisdiction { name: "c".into(), code: "C".into(), mask: 4, active: true, created_at: 0 },
        ]);
        assert_eq!(registry.allowed_mask(), 4);
        assert_eq!(registry.add("d", "D", 0).unwrap().mask, 8);
    }
}
