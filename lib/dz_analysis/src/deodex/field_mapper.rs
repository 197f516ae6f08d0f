//! Mapping of odexed field accesses to their portable counterparts.

use crate::errors::{invalid, AnalysisError, AnalysisResult};
use dz_dex::fields::FieldIdItem;
use dz_dex::instrs::{Instr, Instruction};
use dz_dex::registers::Reg;
use dz_dex::Index;

type FieldIdx = Index<FieldIdItem>;
type InstanceBuilder = fn(Reg, Reg, FieldIdx) -> Instr;
type StaticBuilder = fn(Reg, FieldIdx) -> Instr;

// Columns are indexed by field type: Z, B, S, C, I/F, J/D, L/[
const INSTANCE_GETS: [InstanceBuilder; 7] = [
    Instr::IgetBoolean,
    Instr::IgetByte,
    Instr::IgetShort,
    Instr::IgetChar,
    Instr::Iget,
    Instr::IgetWide,
    Instr::IgetObject,
];
const INSTANCE_PUTS: [InstanceBuilder; 7] = [
    Instr::IputBoolean,
    Instr::IputByte,
    Instr::IputShort,
    Instr::IputChar,
    Instr::Iput,
    Instr::IputWide,
    Instr::IputObject,
];
const STATIC_GETS: [StaticBuilder; 7] = [
    Instr::SgetBoolean,
    Instr::SgetByte,
    Instr::SgetShort,
    Instr::SgetChar,
    Instr::Sget,
    Instr::SgetWide,
    Instr::SgetObject,
];
const STATIC_PUTS: [StaticBuilder; 7] = [
    Instr::SputBoolean,
    Instr::SputByte,
    Instr::SputShort,
    Instr::SputChar,
    Instr::Sput,
    Instr::SputWide,
    Instr::SputObject,
];

/// Odexed opcode expected for each field type, per subtype and direction.
const ODEXED: [[[&str; 3]; 3]; 2] = [
    [
        ["iget-quick", "iget-wide-quick", "iget-object-quick"],
        ["iget-volatile", "iget-wide-volatile", "iget-object-volatile"],
        ["sget-volatile", "sget-wide-volatile", "sget-object-volatile"],
    ],
    [
        ["iput-quick", "iput-wide-quick", "iput-object-quick"],
        ["iput-volatile", "iput-wide-volatile", "iput-object-volatile"],
        ["sput-volatile", "sput-wide-volatile", "sput-object-volatile"],
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subtype {
    InstanceQuick,
    InstanceVolatile,
    StaticVolatile,
}

fn type_index(field_type: &str) -> AnalysisResult<usize> {
    match field_type.chars().next() {
        Some('Z') => Ok(0),
        Some('B') => Ok(1),
        Some('S') => Ok(2),
        Some('C') => Ok(3),
        Some('I' | 'F') => Ok(4),
        Some('J' | 'D') => Ok(5),
        Some('L' | '[') => Ok(6),
        _ => Err(AnalysisError::resolution(format!(
            "Unknown type {field_type}: "
        ))),
    }
}

fn subtype(odexed: &Instr) -> AnalysisResult<Subtype> {
    if odexed.odexed_instance_quick() {
        Ok(Subtype::InstanceQuick)
    } else if odexed.odexed_instance_volatile() {
        Ok(Subtype::InstanceVolatile)
    } else if odexed.odexed_static_volatile() {
        Ok(Subtype::StaticVolatile)
    } else {
        Err(AnalysisError::Internal(format!(
            "Not an odexed field access opcode: {}",
            odexed.mnemonic()
        )))
    }
}

/// Static lookup from odexed field accesses to the matching portable instructions.
pub struct OdexedFieldInstructionMapper;

impl OdexedFieldInstructionMapper {
    /// Builds the portable instruction accessing `field` (of type `field_type`) in place of
    /// the odexed one, keeping its registers.
    ///
    /// The odexed opcode must be the one the runtime would have emitted for a field of this
    /// type, otherwise the instruction is inconsistent.
    pub fn deodexed_field_instruction(
        field_type: &str,
        odexed: &Instr,
        field: FieldIdx,
    ) -> AnalysisResult<Instr> {
        let subtype = subtype(odexed)?;
        let type_idx = type_index(field_type)?;
        let is_get = odexed.sets_register();

        let direction = usize::from(!is_get);
        let row = match subtype {
            Subtype::InstanceQuick => 0,
            Subtype::InstanceVolatile => 1,
            Subtype::StaticVolatile => 2,
        };
        let expected = ODEXED[direction][row][type_idx.saturating_sub(4)];
        if expected != odexed.mnemonic() {
            return invalid(format!(
                "Incorrect field type \"{field_type}\" for {}",
                odexed.mnemonic()
            ));
        }

        match (subtype, odexed.registers()) {
            (Subtype::StaticVolatile, [Some(a), _, _]) => {
                let builder = (if is_get { STATIC_GETS } else { STATIC_PUTS })[type_idx];
                Ok(builder(a, field))
            }
            (_, [Some(a), Some(b), _]) => {
                let builder = (if is_get { INSTANCE_GETS } else { INSTANCE_PUTS })[type_idx];
                Ok(builder(a, b, field))
            }
            _ => Err(AnalysisError::Internal(format!(
                "missing register operands for {}",
                odexed.mnemonic()
            ))),
        }
    }
}
