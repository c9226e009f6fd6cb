// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The capability object: an attenuation set delegated through a wallet
//! signature.
//!
//! Grants are stored as a map from canonical resource key to a set of
//! ability tags; `*` as an ability tag means every ability over that
//! resource. The whole object serializes to exactly one resource URI
//! (`urn:recap:<base64url(canonical JSON)>`) embedded in the signed
//! message, and decodes back to an equal object.

use std::collections::{BTreeMap, BTreeSet};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{LitAbility, LitResource};

/// URI scheme prefix for the encoded attenuation set.
pub const RECAP_URN_PREFIX: &str = "urn:recap:";

/// Wildcard ability tag: every ability over the granted resource.
const ANY_ABILITY: &str = "*";

/// An ordered collection of `(resource, ability)` grants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityObject {
    /// Canonical resource key → granted ability tags.
    ///
    /// `BTreeMap`/`BTreeSet` keep the JSON encoding canonical.
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl CapabilityObject {
    /// An empty capability object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant every ability over each of `resources`.
    pub fn from_resources(resources: &[LitResource]) -> Self {
        let mut object = Self::new();
        for resource in resources {
            object.add_all_capabilities_for_resource(resource);
        }
        object
    }

    /// Whether no grants are present.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Grant `ability` over `resource`.
    pub fn add_capability(&mut self, resource: &LitResource, ability: LitAbility) {
        self.grants
            .entry(resource.key())
            .or_default()
            .insert(ability.as_str().to_string());
    }

    /// Grant every ability over `resource`.
    pub fn add_all_capabilities_for_resource(&mut self, resource: &LitResource) {
        self.grants
            .entry(resource.key())
            .or_default()
            .insert(ANY_ABILITY.to_string());
    }

    /// Whether `ability` is granted over `resource`, either exactly or
    /// through a wildcard grant.
    pub fn verify_capabilities_for_resource(
        &self,
        resource: &LitResource,
        ability: LitAbility,
    ) -> bool {
        let candidates = [
            resource.key(),
            format!("{}://*", resource.prefix()),
            "*".to_string(),
        ];
        candidates.iter().any(|key| {
            self.grants
                .get(key)
                .is_some_and(|abilities| {
                    abilities.contains(ANY_ABILITY) || abilities.contains(ability.as_str())
                })
        })
    }

    /// Encode the attenuation set as a single resource URI.
    pub fn encode_as_siwe_resource(&self) -> String {
        let json = serde_json::to_string(&self.grants).expect("grants always serialize");
        format!("{RECAP_URN_PREFIX}{}", URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a resource URI produced by [`Self::encode_as_siwe_resource`].
    pub fn decode_siwe_resource(uri: &str) -> Result<Self> {
        let body = uri
            .strip_prefix(RECAP_URN_PREFIX)
            .ok_or_else(|| Error::invalid_param_type(format!("not a capability URI: {uri}")))?;
        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| Error::invalid_param_type(format!("invalid capability encoding: {e}")))?;
        let grants: BTreeMap<String, BTreeSet<String>> = serde_json::from_slice(&json)
            .map_err(|e| Error::invalid_param_type(format!("invalid capability JSON: {e}")))?;
        Ok(Self { grants })
    }

    /// Human-readable delegation statement embedded in the signed
    /// message.
    pub fn statement(&self) -> String {
        let mut rendered = String::from(
            "I further authorize the stated URI to perform the following actions on my behalf:",
        );
        for (index, (key, abilities)) in self.grants.iter().enumerate() {
            let tags: Vec<&str> = abilities.iter().map(String::as_str).collect();
            rendered.push_str(&format!(
                " ({}) '{}' for '{}'.",
                index + 1,
                tags.join("', '"),
                key
            ));
        }
        rendered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut object = CapabilityObject::new();
        object.add_capability(&LitResource::any_pkp(), LitAbility::PkpSigning);
        object.add_all_capabilities_for_resource(&LitResource::LitAction("QmfM2".into()));

        let encoded = object.encode_as_siwe_resource();
        assert!(encoded.starts_with(RECAP_URN_PREFIX));
        let decoded = CapabilityObject::decode_siwe_resource(&encoded).unwrap();
        assert_eq!(decoded, object);
    }

    #[test]
    fn encoding_is_canonical() {
        let mut a = CapabilityObject::new();
        a.add_capability(&LitResource::any_pkp(), LitAbility::PkpSigning);
        a.add_capability(&LitResource::any_action(), LitAbility::LitActionExecution);

        let mut b = CapabilityObject::new();
        b.add_capability(&LitResource::any_action(), LitAbility::LitActionExecution);
        b.add_capability(&LitResource::any_pkp(), LitAbility::PkpSigning);

        assert_eq!(a.encode_as_siwe_resource(), b.encode_as_siwe_resource());
    }

    #[test]
    fn exact_and_wildcard_grants_verify() {
        let mut object = CapabilityObject::new();
        object.add_capability(
            &LitResource::Pkp("04deadbeef".into()),
            LitAbility::PkpSigning,
        );
        object.add_all_capabilities_for_resource(&LitResource::any_action());

        // Exact grant.
        assert!(object.verify_capabilities_for_resource(
            &LitResource::Pkp("04deadbeef".into()),
            LitAbility::PkpSigning
        ));
        // Exact grant does not extend to other abilities.
        assert!(!object.verify_capabilities_for_resource(
            &LitResource::Pkp("04deadbeef".into()),
            LitAbility::LitActionExecution
        ));
        // Wildcard resource grant covers specific ids and all abilities.
        assert!(object.verify_capabilities_for_resource(
            &LitResource::LitAction("QmfM2".into()),
            LitAbility::LitActionExecution
        ));
        // Ungranted resource kind.
        assert!(!object.verify_capabilities_for_resource(
            &LitResource::any_access_control_condition(),
            LitAbility::AccessControlConditionDecryption
        ));
    }

    #[test]
    fn decode_rejects_foreign_uris() {
        assert!(CapabilityObject::decode_siwe_resource("https://example.com").is_err());
        assert!(CapabilityObject::decode_siwe_resource("urn:recap:!!!").is_err());
        assert!(CapabilityObject::decode_siwe_resource("urn:recap:bm90LWpzb24").is_err());
    }

    #[test]
    fn statement_enumerates_grants_in_order() {
        let mut object = CapabilityObject::new();
        object.add_all_capabilities_for_resource(&LitResource::any_action());
        object.add_capability(&LitResource::any_pkp(), LitAbility::PkpSigning);

        let statement = object.statement();
        assert!(statement.starts_with("I further authorize the stated URI"));
        assert!(statement.contains("(1) '*' for 'lit-litaction://*'."));
        assert!(statement.contains("(2) 'pkp-signing' for 'lit-pkp://*'."));
    }
}
