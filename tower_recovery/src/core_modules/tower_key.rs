// THEORY:
// A `TowerKey` is the single integer that identifies one readout tower across every
// container in the crate. It packs the calorimeter id and the two grid indices into
// a `u32`, so that the dead map, the geometry, and the tower store can all agree on
// identity without sharing any object.
//
// Layout (most significant bit first):
//   [ calo id : 8 ][ eta index : 12 ][ phi index : 12 ]
//
// Because eta sits above phi, ascending key order within one calorimeter is
// eta-major, phi-minor. The dead map iterates in that order.
//
// An index that does not fit its 12-bit field is rejected rather than masked, so two
// distinct coordinates can never share a key.

use crate::error::RecoveryError;

/// Opaque identifier of a single tower.
pub type TowerKey = u32;

pub const CALO_ID_BITS: u32 = 8;
pub const INDEX_BITS: u32 = 12;
/// One past the largest index that fits in a key field.
pub const MAX_INDEX: u32 = 1 << INDEX_BITS;

const INDEX_MASK: u32 = MAX_INDEX - 1;
const CALO_SHIFT: u32 = 2 * INDEX_BITS;

/// Packs a calorimeter id and a pair of bin indices into a key.
pub fn encode_tower_key(calo_id: u8, bineta: u32, binphi: u32) -> Result<TowerKey, RecoveryError> {
    if bineta >= MAX_INDEX || binphi >= MAX_INDEX {
        return Err(RecoveryError::IndexOverflow {
            bineta,
            binphi,
            max: MAX_INDEX,
        });
    }
    Ok(pack(calo_id, bineta, binphi))
}

/// Packing for indices already known to be below `MAX_INDEX`.
pub(crate) fn pack(calo_id: u8, bineta: u32, binphi: u32) -> TowerKey {
    debug_assert!(bineta < MAX_INDEX && binphi < MAX_INDEX);
    ((calo_id as u32) << CALO_SHIFT) | (bineta << INDEX_BITS) | binphi
}

pub fn decode_calo_id(key: TowerKey) -> u8 {
    (key >> CALO_SHIFT) as u8
}

pub fn decode_bineta(key: TowerKey) -> u32 {
    (key >> INDEX_BITS) & INDEX_MASK
}

pub fn decode_binphi(key: TowerKey) -> u32 {
    key & INDEX_MASK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_fields_are_recoverable() {
        let key = encode_tower_key(3, 95, 255).unwrap();
        assert_eq!(decode_calo_id(key), 3);
        assert_eq!(decode_bineta(key), 95);
        assert_eq!(decode_binphi(key), 255);
    }

    #[test]
    fn keys_order_eta_major() {
        let a = encode_tower_key(1, 0, 4095).unwrap();
        let b = encode_tower_key(1, 1, 0).unwrap();
        assert!(a < b);
    }

    #[test]
    fn calorimeters_do_not_collide() {
        assert_ne!(encode_tower_key(1, 2, 2).unwrap(), encode_tower_key(2, 2, 2).unwrap());
    }

    #[test]
    fn index_past_field_width_is_rejected() {
        assert!(matches!(
            encode_tower_key(1, MAX_INDEX + 1, 1),
            Err(RecoveryError::IndexOverflow { bineta: 4097, binphi: 1, .. })
        ));
        assert!(encode_tower_key(1, 1, MAX_INDEX).is_err());
        assert!(encode_tower_key(1, MAX_INDEX - 1, MAX_INDEX - 1).is_ok());
    }
}
