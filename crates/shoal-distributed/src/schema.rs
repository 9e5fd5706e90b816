//! Wire schema for agent records.
//!
//! The schema is built once when the process group starts and handed by
//! reference to the distribution channel and the aggregator. It fixes the
//! byte layout of an agent record so slices can cross a worker boundary as
//! flat frames, and it rejects frames that do not decode to whole records.

use crate::group::Frame;
use crate::types::{DistributedError, DistributedResult};
use shoal_core::types::Agent;

/// One field of the agent record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Encoded width in bytes.
    pub width: usize,
}

const AGENT_FIELDS: [FieldSpec; 6] = [
    FieldSpec { name: "position.x", width: 8 },
    FieldSpec { name: "position.y", width: 8 },
    FieldSpec { name: "distance_from_origin", width: 8 },
    FieldSpec { name: "initial_weight", width: 8 },
    FieldSpec { name: "weight", width: 8 },
    FieldSpec { name: "delta", width: 8 },
];

/// Immutable description of everything the collectives put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireSchema {
    fields: &'static [FieldSpec],
    record_size: usize,
    sum_width: usize,
}

impl WireSchema {
    /// Build the schema.
    ///
    /// # Errors
    ///
    /// Returns `DistributedError::Codec` if the encoded agent does not match
    /// the declared field layout.
    pub fn new() -> DistributedResult<Self> {
        let record_size = bincode::serialized_size(&Agent::default())? as usize;
        let declared: usize = AGENT_FIELDS.iter().map(|f| f.width).sum();
        if declared != record_size {
            return Err(DistributedError::Codec(format!(
                "agent record encodes to {} bytes, layout declares {}",
                record_size, declared
            )));
        }
        Ok(Self {
            fields: &AGENT_FIELDS,
            record_size,
            sum_width: 2,
        })
    }

    pub fn fields(&self) -> &[FieldSpec] {
        self.fields
    }

    /// Encoded bytes per agent.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Number of components in the per-step sum reduction.
    pub fn sum_width(&self) -> usize {
        self.sum_width
    }

    /// Encode a slice as back-to-back records.
    pub fn encode_slice(&self, agents: &[Agent]) -> DistributedResult<Frame> {
        let mut frame = Vec::with_capacity(agents.len() * self.record_size);
        for agent in agents {
            bincode::serialize_into(&mut frame, agent)?;
        }
        Ok(frame)
    }

    /// Decode a frame produced by [`encode_slice`](Self::encode_slice).
    pub fn decode_slice(&self, frame: &[u8]) -> DistributedResult<Vec<Agent>> {
        if frame.len() % self.record_size != 0 {
            return Err(DistributedError::Codec(format!(
                "frame of {} bytes is not a whole number of {}-byte records",
                frame.len(),
                self.record_size
            )));
        }
        frame
            .chunks_exact(self.record_size)
            .map(|record| bincode::deserialize(record).map_err(DistributedError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_core::types::{Position, WeightLimits};

    fn sample_agents() -> Vec<Agent> {
        let limits = WeightLimits::default();
        (0..5)
            .map(|i| {
                let mut agent = Agent::new(Position::new(i as f64, -(i as f64) / 3.0), 100.0 + i as f64);
                agent.move_to(Position::new(i as f64 + 0.05, 0.25));
                agent.set_weight(150.0, &limits);
                agent
            })
            .collect()
    }

    #[test]
    fn test_record_layout() {
        let schema = WireSchema::new().unwrap();
        assert_eq!(schema.record_size(), 48);
        assert_eq!(schema.fields().len(), 6);
        assert_eq!(schema.fields()[0].name, "position.x");
        assert_eq!(schema.sum_width(), 2);
    }

    #[test]
    fn test_slice_survives_the_wire() {
        let schema = WireSchema::new().unwrap();
        let agents = sample_agents();

        let frame = schema.encode_slice(&agents).unwrap();
        assert_eq!(frame.len(), agents.len() * schema.record_size());
        assert_eq!(schema.decode_slice(&frame).unwrap(), agents);
    }

    #[test]
    fn test_empty_slice() {
        let schema = WireSchema::new().unwrap();
        let frame = schema.encode_slice(&[]).unwrap();
        assert!(frame.is_empty());
        assert!(schema.decode_slice(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let schema = WireSchema::new().unwrap();
        let mut frame = schema.encode_slice(&sample_agents()).unwrap();
        frame.pop();
        assert!(matches!(
            schema.decode_slice(&frame),
            Err(DistributedError::Codec(_))
        ));
    }
}
