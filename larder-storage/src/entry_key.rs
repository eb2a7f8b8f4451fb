//! Tenant-scoped entry keys.
//!
//! An [`EntryKey`] cannot be built without a tenant, so every lookup the
//! stores perform is tenant-isolated by construction.

use larder_core::{FieldType, LarderResult, TenantId, ValidationError};

/// Separator byte between the tenant id and the rest of the key.
const TENANT_SEPARATOR: u8 = 0xFF;

/// Terminator after the field type. Field types may not contain it.
const FIELD_TERMINATOR: u8 = 0x00;

const TENANT_BYTES: usize = 8;

/// Unique key of a cache entry: `(tenant, field_type, value)`.
///
/// # Binary Format
///
/// - Bytes 0-7: tenant id, big-endian with the sign bit flipped so keys sort
///   numerically
/// - Byte 8: separator (0xFF)
/// - field type bytes, then a 0x00 terminator
/// - value bytes (to the end of the key)
///
/// Keys of one tenant, and of one (tenant, field type) scope, are therefore
/// contiguous and can be range-scanned by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    inner: EntryKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKeyInner {
    tenant_id: TenantId,
    field_type: FieldType,
    value: String,
}

impl EntryKey {
    pub fn new(tenant_id: TenantId, field_type: FieldType, value: impl Into<String>) -> Self {
        Self {
            inner: EntryKeyInner {
                tenant_id,
                field_type,
                value: value.into(),
            },
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.inner.tenant_id
    }

    pub fn field_type(&self) -> &FieldType {
        &self.inner.field_type
    }

    pub fn value(&self) -> &str {
        &self.inner.value
    }

    /// Encode this key for ordered byte storage.
    ///
    /// Fails if the field type contains a NUL byte.
    pub fn encode(&self) -> LarderResult<Vec<u8>> {
        let mut bytes = Self::scope_prefix(self.inner.tenant_id, &self.inner.field_type)?;
        bytes.extend_from_slice(self.inner.value.as_bytes());
        Ok(bytes)
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the separator or terminator is missing or either
    /// string is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < TENANT_BYTES + 2 || bytes[TENANT_BYTES] != TENANT_SEPARATOR {
            return None;
        }

        let tenant_bytes: [u8; TENANT_BYTES] = bytes[..TENANT_BYTES].try_into().ok()?;
        let tenant_id = decode_tenant(tenant_bytes);

        let rest = &bytes[TENANT_BYTES + 1..];
        let terminator = rest.iter().position(|b| *b == FIELD_TERMINATOR)?;
        let field_type = std::str::from_utf8(&rest[..terminator]).ok()?;
        let value = std::str::from_utf8(&rest[terminator + 1..]).ok()?;

        Some(Self::new(tenant_id, FieldType::new(field_type), value))
    }

    /// Prefix covering every key of a tenant.
    pub fn tenant_prefix(tenant_id: TenantId) -> [u8; TENANT_BYTES + 1] {
        let mut prefix = [0u8; TENANT_BYTES + 1];
        prefix[..TENANT_BYTES].copy_from_slice(&encode_tenant(tenant_id));
        prefix[TENANT_BYTES] = TENANT_SEPARATOR;
        prefix
    }

    /// Prefix covering every key of one (tenant, field type) scope.
    pub fn scope_prefix(tenant_id: TenantId, field_type: &FieldType) -> LarderResult<Vec<u8>> {
        let name = field_type.as_str().as_bytes();
        if name.contains(&FIELD_TERMINATOR) {
            return Err(ValidationError::InvalidValue {
                field: "field_type".to_string(),
                reason: "must not contain NUL bytes".to_string(),
            }
            .into());
        }

        let mut prefix = Vec::with_capacity(TENANT_BYTES + 2 + name.len());
        prefix.extend_from_slice(&Self::tenant_prefix(tenant_id));
        prefix.extend_from_slice(name);
        prefix.push(FIELD_TERMINATOR);
        Ok(prefix)
    }
}

fn encode_tenant(tenant_id: TenantId) -> [u8; TENANT_BYTES] {
    ((tenant_id.get() as u64) ^ (1 << 63)).to_be_bytes()
}

fn decode_tenant(bytes: [u8; TENANT_BYTES]) -> TenantId {
    TenantId::new((u64::from_be_bytes(bytes) ^ (1 << 63)) as i64)
}
