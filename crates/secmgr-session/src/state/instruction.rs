//! Instructions recorded in an authentication session state log.
//!
//! Wire form: `{"operation": "ADD_CREDENTIAL", "authority": "...", "operand": {...}}`.
//! The operand's shape is determined by the operation.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};

use secmgr_core::error::AppError;
use secmgr_core::types::Authority;

use crate::cookie::Cookie;
use crate::credential::Credential;
use crate::verification::Verification;

/// Wire name of an [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    AddCookie,
    RemoveCookie,
    AddCredential,
    RemoveCredential,
    AddVerification,
    RemoveVerification,
}

/// A single change to session state, with its operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddCookie(Cookie),
    RemoveCookie(Cookie),
    AddCredential(Credential),
    RemoveCredential(Credential),
    AddVerification(Verification),
    RemoveVerification(Verification),
}

impl Operation {
    /// The wire name of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AddCookie(_) => OperationKind::AddCookie,
            Self::RemoveCookie(_) => OperationKind::RemoveCookie,
            Self::AddCredential(_) => OperationKind::AddCredential,
            Self::RemoveCredential(_) => OperationKind::RemoveCredential,
            Self::AddVerification(_) => OperationKind::AddVerification,
            Self::RemoveVerification(_) => OperationKind::RemoveVerification,
        }
    }
}

/// An immutable log entry: an operation attributed to the authority that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "WireInstruction")]
pub struct Instruction {
    /// Producer of the fact.
    pub authority: Authority,
    /// What changed.
    pub operation: Operation,
}

impl Instruction {
    /// Creates an instruction.
    pub fn new(authority: Authority, operation: Operation) -> Self {
        Self {
            authority,
            operation,
        }
    }
}

impl Serialize for Instruction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Instruction", 3)?;
        state.serialize_field("operation", &self.operation.kind())?;
        state.serialize_field("authority", &self.authority)?;
        match &self.operation {
            Operation::AddCookie(cookie) | Operation::RemoveCookie(cookie) => {
                state.serialize_field("operand", cookie)?
            }
            Operation::AddCredential(credential) | Operation::RemoveCredential(credential) => {
                state.serialize_field("operand", credential)?
            }
            Operation::AddVerification(verification)
            | Operation::RemoveVerification(verification) => {
                state.serialize_field("operand", verification)?
            }
        }
        state.end()
    }
}

#[derive(Deserialize)]
struct WireInstruction {
    operation: OperationKind,
    authority: Authority,
    operand: serde_json::Value,
}

impl TryFrom<WireInstruction> for Instruction {
    type Error = AppError;

    fn try_from(wire: WireInstruction) -> Result<Self, Self::Error> {
        let operand = wire.operand;
        let operation = match wire.operation {
            OperationKind::AddCookie => Operation::AddCookie(serde_json::from_value(operand)?),
            OperationKind::RemoveCookie => Operation::RemoveCookie(serde_json::from_value(operand)?),
            OperationKind::AddCredential => {
                Operation::AddCredential(serde_json::from_value(operand)?)
            }
            OperationKind::RemoveCredential => {
                Operation::RemoveCredential(serde_json::from_value(operand)?)
            }
            OperationKind::AddVerification => {
                Operation::AddVerification(serde_json::from_value(operand)?)
            }
            OperationKind::RemoveVerification => {
                Operation::RemoveVerification(serde_json::from_value(operand)?)
            }
        };
        Ok(Self::new(wire.authority, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let instruction = Instruction::new(
            Authority::for_mechanism("form1"),
            Operation::AddCredential(Credential::principal("alice")),
        );
        let json = serde_json::to_value(&instruction).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "operation": "ADD_CREDENTIAL",
                "authority": "urn:secmgr:mechanism:form1",
                "operand": { "type": "principal", "name": "alice" }
            })
        );
        let parsed: Instruction = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, instruction);
    }

    #[test]
    fn test_mismatched_operand_is_rejected() {
        let json = serde_json::json!({
            "operation": "ADD_COOKIE",
            "authority": "urn:secmgr:mechanism:form1",
            "operand": { "type": "principal", "name": "alice" }
        });
        assert!(serde_json::from_value::<Instruction>(json).is_err());
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let json = serde_json::json!({
            "operation": "ADD_TICKET",
            "authority": "a",
            "operand": {}
        });
        assert!(serde_json::from_value::<Instruction>(json).is_err());
    }
}
