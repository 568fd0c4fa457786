//! Dynamic position updates (XYZ) payload.
//!
//! One payload carries a 6-bit timestamp in 32-sample ticks followed by
//! 42-bit records, each naming an object and its new position codes. The
//! writer emits one payload per distinct timestamp run of the sorted
//! timeline.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::element::ElementKind;
use crate::model::profile::EntityKind;
use crate::model::update::Update;
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, ModelError};

const PAYLOAD: &str = "XYZ";

const TIME_BITS: u64 = 6;
const RECORD_BITS: u64 = 42;

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.updates.len();
    loop {
        if state.updates_written >= total {
            return Ok(Written::Yes);
        }
        let budget = (w.value_space() * 8) as u64;
        if budget < TIME_BITS + RECORD_BITS {
            return Ok(Written::No);
        }

        let time = model.updates[state.updates_written].time;
        let mut bs = BsIoVecWriter::default();
        bs.put_n(TIME_BITS as u32, time)?;
        let mut count = 0;
        for update in &model.updates[state.updates_written..] {
            if update.time != time || bs.position() + RECORD_BITS > budget {
                break;
            }
            bs.put_n(12, model.elements[update.element_index as usize].id)?;
            bs.put_n(10, update.x)?;
            bs.put_n(10, update.y)?;
            bs.put_n(10, update.z)?;
            count += 1;
        }
        if count == 0 {
            return Ok(Written::No);
        }
        w.commit_local(LocalTag::DynamicUpdates as u8, &bs.finish()?)?;
        state.updates_written += count;
    }
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    let time: u16 = bs.get_n(TIME_BITS as u32)?;
    while bs.available()? >= RECORD_BITS {
        let id = read_checked(&mut bs, 12, PAYLOAD, "object id", nonzero)? as u16;
        let x = read_checked(&mut bs, 10, PAYLOAD, "x position", nonzero)? as u16;
        let y = read_checked(&mut bs, 10, PAYLOAD, "y position", nonzero)? as u16;
        let z = read_checked(&mut bs, 10, PAYLOAD, "z position", nonzero)? as u16;
        let Some(element_index) = model.element_index(id) else {
            return Err(KlvError::DanglingReference {
                payload: PAYLOAD,
                kind: EntityKind::Element,
                id,
            });
        };
        if !matches!(
            model.elements[element_index as usize].kind,
            ElementKind::Object(_)
        ) {
            return Err(model_err(PAYLOAD, ModelError::NotAnObject { id }));
        }
        model
            .insert_update(Update {
                time,
                element_index,
                x,
                y,
                z,
            })
            .map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::ObjectMetadata;

    fn model_with_objects() -> anyhow::Result<PmdModel> {
        let mut model = PmdModel::new();
        let mut md = ObjectMetadata::default();
        md.dynamic_updates = true;
        model.add_object(1, md.clone())?;
        model.add_object(2, md)?;
        Ok(model)
    }

    #[test]
    fn one_payload_per_timestamp_run() -> anyhow::Result<()> {
        let mut model = model_with_objects()?;
        model.add_update(4, 1, 0.1, 0.0, 0.0)?;
        model.add_update(4, 2, 0.2, 0.0, 0.0)?;
        model.add_update(9, 1, 0.3, 0.0, 0.0)?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 64];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        // Two frames: (6 + 84 bits -> 12 bytes) and (6 + 42 bits -> 6 bytes).
        assert_eq!(len, 14 + 8);

        let mut decoded = model_with_objects()?;
        let mut walker = crate::klv::reader::FrameWalker::new(&buf[..len]);
        while let Some(frame) = walker.next_frame()? {
            read(&mut decoded, frame.value)?;
        }
        assert_eq!(decoded.updates().len(), 3);
        assert_eq!(decoded.updates()[2].time, 9);

        decoded.apply_updates();
        let ElementKind::Object(md) = &decoded.element(1).unwrap().kind else {
            unreachable!()
        };
        assert!((md.position().0 - 0.3).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn same_tick_order_survives_a_round_trip() -> anyhow::Result<()> {
        let mut model = model_with_objects()?;
        model.add_update(4, 2, 0.2, 0.0, 0.0)?;
        model.add_update(4, 1, 0.1, 0.0, 0.0)?;
        // Two updates for the same object in one tick: the later one must
        // still win after a write/read cycle.
        model.add_update(7, 1, -0.5, 0.0, 0.0)?;
        model.add_update(7, 1, 0.5, 0.0, 0.0)?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 64];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();

        let mut decoded = model_with_objects()?;
        let mut walker = crate::klv::reader::FrameWalker::new(&buf[..len]);
        while let Some(frame) = walker.next_frame()? {
            read(&mut decoded, frame.value)?;
        }
        let order: Vec<(u16, u16)> = decoded
            .updates()
            .iter()
            .map(|u| (u.time, u.element_index))
            .collect();
        let expected: Vec<(u16, u16)> = model
            .updates()
            .iter()
            .map(|u| (u.time, u.element_index))
            .collect();
        assert_eq!(order, expected);

        decoded.apply_updates();
        let ElementKind::Object(md) = &decoded.element(1).unwrap().kind else {
            unreachable!()
        };
        assert!((md.position().0 - 0.5).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn update_for_bed_is_rejected() -> anyhow::Result<()> {
        use crate::model::element::{BedMetadata, SpeakerConfig};

        let mut model = model_with_objects()?;
        model.add_update(0, 1, 0.5, 0.5, 0.5)?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 16];
        let mut w = KlvWriter::new(&mut buf);
        write(&model, &mut state, &mut w)?;
        let len = w.position();

        // Same wire id resolves to a bed in the receiving model.
        let mut decoded = PmdModel::new();
        decoded.add_bed(1, BedMetadata::new(SpeakerConfig::Stereo))?;
        let err = read(&mut decoded, &buf[2..len]).unwrap_err();
        assert!(matches!(
            err,
            KlvError::NoRoom {
                source: ModelError::NotAnObject { id: 1 },
                ..
            }
        ));
        Ok(())
    }
}
