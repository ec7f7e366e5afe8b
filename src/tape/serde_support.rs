//! Serde support for tapes.
//!
//! Tapes holding atomic calls cannot round-trip (the calls hold callback
//! objects); serialization refuses them with an error.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::float::Value;
use crate::opcode::OpCode;

use super::{CompareRecord, Tape};

impl<V: Value + Serialize> Serialize for Tape<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if !self.atomic_calls.is_empty() {
            return Err(serde::ser::Error::custom(
                "cannot serialize a Tape containing atomic calls; \
                 atomic functions must be re-recorded after deserialization",
            ));
        }
        let mut s = serializer.serialize_struct("Tape", 9)?;
        s.serialize_field("opcodes", &self.opcodes)?;
        s.serialize_field("arg_indices", &self.arg_indices)?;
        s.serialize_field("values", &self.values)?;
        s.serialize_field("num_inputs", &self.num_inputs)?;
        s.serialize_field("num_variables", &self.num_variables)?;
        s.serialize_field("output_indices", &self.output_indices)?;
        s.serialize_field("compares", &self.compares)?;
        s.serialize_field("check_for_nan", &self.check_for_nan)?;
        s.serialize_field("check_compare", &self.check_compare)?;
        s.end()
    }
}

impl<'de, V: Value + Deserialize<'de>> Deserialize<'de> for Tape<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct TapeData<V> {
            opcodes: Vec<OpCode>,
            arg_indices: Vec<[u32; 2]>,
            values: Vec<V>,
            num_inputs: u32,
            num_variables: u32,
            output_indices: Vec<u32>,
            #[serde(default)]
            compares: Vec<CompareRecord>,
            check_for_nan: bool,
            check_compare: bool,
        }

        let data = TapeData::<V>::deserialize(deserializer)?;
        Ok(Tape {
            opcodes: data.opcodes,
            arg_indices: data.arg_indices,
            values: data.values,
            num_inputs: data.num_inputs,
            num_variables: data.num_variables,
            output_indices: data.output_indices,
            atomic_calls: Vec::new(),
            compares: data.compares,
            check_for_nan: data.check_for_nan,
            check_compare: data.check_compare,
        })
    }
}
