//! Headphone element description (HED) payload.
//!
//! Binaural rendering hints: 12-bit element id, head-tracking flag, 7-bit
//! render mode, and for bed elements a 16-bit channel exclusion mask. The
//! record shape depends on the referenced element's kind, so elements must
//! precede their descriptions in the stream.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::element::ElementKind;
use crate::model::hed::HeadphoneDesc;
use crate::model::profile::EntityKind;
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::KlvError;

const PAYLOAD: &str = "HED";

const OBJECT_RECORD_BITS: u64 = 20;
const BED_RECORD_BITS: u64 = 36;

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.hed.len();
    if state.hed_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for hed in &model.hed[state.hed_written..] {
        let is_bed = model
            .element(hed.element_id)
            .is_some_and(|e| matches!(e.kind, ElementKind::Bed(_)));
        let bits = if is_bed {
            BED_RECORD_BITS
        } else {
            OBJECT_RECORD_BITS
        };
        if bs.position() + bits > budget {
            break;
        }
        bs.put_n(12, hed.element_id)?;
        bs.put(hed.head_tracking)?;
        bs.put_n(7, hed.render_mode)?;
        if is_bed {
            bs.put_n(16, hed.channel_mask)?;
        }
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::HeadphoneElementDesc as u8, &bs.finish()?)?;
    state.hed_written += count;
    Ok(if state.hed_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= OBJECT_RECORD_BITS {
        let id = read_checked(&mut bs, 12, PAYLOAD, "element id", nonzero)? as u16;
        let is_bed = match model.element(id) {
            Some(element) => matches!(element.kind, ElementKind::Bed(_)),
            None => {
                return Err(KlvError::DanglingReference {
                    payload: PAYLOAD,
                    kind: EntityKind::Element,
                    id,
                });
            }
        };
        let head_tracking = bs.get()?;
        let render_mode: u8 = bs.get_n(7)?;
        let mut hed = HeadphoneDesc::new(id, render_mode).map_err(|e| model_err(PAYLOAD, e))?;
        hed.head_tracking = head_tracking;
        if is_bed {
            hed.channel_mask = bs.get_n(16)?;
        }
        model.add_hed(hed).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::{BedMetadata, ObjectMetadata, SpeakerConfig};

    fn model_with_elements() -> anyhow::Result<PmdModel> {
        let mut model = PmdModel::new();
        model.add_bed(1, BedMetadata::new(SpeakerConfig::Surround51))?;
        model.add_object(2, ObjectMetadata::default())?;
        Ok(model)
    }

    #[test]
    fn bed_and_object_records_round_trip() -> anyhow::Result<()> {
        let mut model = model_with_elements()?;
        let mut bed_hed = HeadphoneDesc::new(1, 3)?;
        bed_hed.channel_mask = 0b0000_0000_0011_0111;
        model.add_hed(bed_hed)?;
        let mut obj_hed = HeadphoneDesc::new(2, 127)?;
        obj_hed.head_tracking = true;
        model.add_hed(obj_hed)?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 32];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        // 36 + 20 bits pack into 7 value bytes.
        assert_eq!(len, 9);

        let mut decoded = model_with_elements()?;
        read(&mut decoded, &buf[2..len])?;
        let descs: Vec<&HeadphoneDesc> = decoded.headphone_descs().collect();
        assert_eq!(descs, vec![&bed_hed, &obj_hed]);
        Ok(())
    }

    #[test]
    fn description_for_unknown_element_fails() -> anyhow::Result<()> {
        let mut model = model_with_elements()?;
        model.add_hed(HeadphoneDesc::new(2, 0)?)?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 16];
        let mut w = KlvWriter::new(&mut buf);
        write(&model, &mut state, &mut w)?;
        let len = w.position();

        let mut decoded = PmdModel::new();
        let err = read(&mut decoded, &buf[2..len]).unwrap_err();
        assert!(matches!(
            err,
            KlvError::DanglingReference {
                kind: EntityKind::Element,
                id: 2,
                ..
            }
        ));
        Ok(())
    }
}
