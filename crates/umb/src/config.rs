//! Configuration for reading and writing UMB archives.

use crate::archive::Compression;
use crate::vector::ByteOrder;

/// Structural policies applied by model validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationConfig {
    /// Reject states that own no choice (deadlock states).
    ///
    /// Off by default: a state with an empty choice range is accepted and
    /// only fails when a choice is sampled from it.
    pub require_state_choices: bool,
}

impl ValidationConfig {
    /// Creates a validation configuration.
    pub fn new(require_state_choices: bool) -> Self {
        Self {
            require_state_choices,
        }
    }

    /// Validation that additionally rejects states without choices.
    pub fn strict() -> Self {
        Self::new(true)
    }
}

/// Configuration for the UMB codec.
#[derive(Debug, Clone, Default)]
pub struct UmbConfig {
    /// Byte order of all binary members.
    pub byte_order: ByteOrder,
    /// Validation policy applied after reading and before writing.
    pub validation: ValidationConfig,
    /// Archive compression; `None` derives it from the path suffix.
    pub compression: Option<Compression>,
}

impl UmbConfig {
    /// Creates a codec configuration with custom settings.
    pub fn new(
        byte_order: ByteOrder,
        validation: ValidationConfig,
        compression: Option<Compression>,
    ) -> Self {
        Self {
            byte_order,
            validation,
            compression,
        }
    }

    /// Sets the byte order.
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Sets the validation policy.
    pub fn with_validation(mut self, validation: ValidationConfig) -> Self {
        self.validation = validation;
        self
    }

    /// Forces a compression regardless of the path suffix.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }
}
