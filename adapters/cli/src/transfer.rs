use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use gacha_sim_core::{Category, CategoryId, Command, Gacha, GachaId, Prize, PrizeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const SNAPSHOT_DOMAIN: &str = "gacha";
const SNAPSHOT_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded payload.
pub(crate) const SNAPSHOT_HEADER: &str = "gacha:v1";
/// Delimiter used to separate the prefix, version and payload.
const FIELD_DELIMITER: char = ':';

/// Shareable copy of a gacha's configuration. Targets and history stay behind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GachaTransfer {
    /// Display name of the exported gacha.
    pub(crate) name: String,
    /// User-defined categories; the sentinel is implied.
    pub(crate) categories: Vec<Category>,
    /// Prize pool in display order.
    pub(crate) prizes: Vec<Prize>,
}

impl GachaTransfer {
    pub(crate) fn from_gacha(gacha: &Gacha) -> Self {
        Self {
            name: gacha.name.clone(),
            categories: gacha
                .categories
                .iter()
                .filter(|category| !category.id.is_sentinel())
                .cloned()
                .collect(),
            prizes: gacha.prizes.clone(),
        }
    }

    /// Encodes the configuration into a single-line string suitable for clipboard transfer.
    pub(crate) fn encode(&self) -> Result<String, TransferError> {
        let json = serde_json::to_vec(self).map_err(TransferError::InvalidPayload)?;
        let encoded = STANDARD_NO_PAD.encode(json);
        Ok(format!("{SNAPSHOT_HEADER}{FIELD_DELIMITER}{encoded}"))
    }

    /// Decodes a configuration from its string representation.
    pub(crate) fn decode(value: &str) -> Result<Self, TransferError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TransferError::EmptyPayload);
        }

        let mut parts = trimmed.splitn(3, FIELD_DELIMITER);
        let domain = parts.next().ok_or(TransferError::MissingPrefix)?;
        let version = parts.next().ok_or(TransferError::MissingVersion)?;
        let payload = parts.next().ok_or(TransferError::MissingPayload)?;

        if domain != SNAPSHOT_DOMAIN {
            return Err(TransferError::InvalidPrefix(domain.to_owned()));
        }
        if version != SNAPSHOT_VERSION {
            return Err(TransferError::UnsupportedVersion(version.to_owned()));
        }

        let bytes = STANDARD_NO_PAD
            .decode(payload.as_bytes())
            .map_err(TransferError::InvalidEncoding)?;
        serde_json::from_slice(&bytes).map_err(TransferError::InvalidPayload)
    }

    /// Builds the commands that recreate this configuration as a new gacha.
    ///
    /// Categories and prizes receive fresh ids from `fresh_id`; prizes that
    /// referenced an unknown category land in the sentinel category.
    pub(crate) fn into_commands(
        self,
        gacha: GachaId,
        mut fresh_id: impl FnMut() -> String,
    ) -> Vec<Command> {
        let mut commands = vec![Command::CreateGacha {
            id: gacha.clone(),
            name: Some(self.name),
        }];

        let mut remapped: HashMap<CategoryId, CategoryId> = HashMap::new();
        for category in self.categories {
            if category.id.is_sentinel() || remapped.contains_key(&category.id) {
                continue;
            }
            let id = CategoryId::new(fresh_id());
            let _ = remapped.insert(category.id, id.clone());
            commands.push(Command::AddCategory {
                gacha: gacha.clone(),
                category: Category::new(id, category.name),
            });
        }

        let prizes: Vec<Prize> = self
            .prizes
            .into_iter()
            .map(|prize| {
                let category = remapped
                    .get(&prize.category_id)
                    .cloned()
                    .unwrap_or_else(CategoryId::sentinel);
                Prize {
                    id: PrizeId::new(fresh_id()),
                    category_id: category,
                    ..prize
                }
            })
            .collect();
        if !prizes.is_empty() {
            commands.push(Command::AddPrizes { gacha, prizes });
        }
        commands
    }
}

/// Errors that can occur while decoding transfer strings.
#[derive(Debug, Error)]
pub(crate) enum TransferError {
    /// The provided string was empty or contained only whitespace.
    #[error("transfer payload was empty")]
    EmptyPayload,
    /// The prefix segment was missing.
    #[error("transfer string is missing the prefix")]
    MissingPrefix,
    /// The version segment was missing.
    #[error("transfer string is missing the version")]
    MissingVersion,
    /// The payload segment was missing.
    #[error("transfer string is missing the payload")]
    MissingPayload,
    /// The string used an unexpected prefix segment.
    #[error("transfer prefix '{0}' is not supported")]
    InvalidPrefix(String),
    /// The string used an unsupported version identifier.
    #[error("transfer version '{0}' is not supported")]
    UnsupportedVersion(String),
    /// The base64 payload could not be decoded.
    #[error("could not decode transfer payload")]
    InvalidEncoding(#[source] base64::DecodeError),
    /// The payload could not be serialised or deserialised.
    #[error("could not process transfer payload")]
    InvalidPayload(#[source] serde_json::Error),
}
