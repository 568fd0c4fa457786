//! Audio object description (AOD) payload.
//!
//! Fixed 68-bit records: id, class, the dynamic-updates flag, the three
//! position codes, size, the 3D-size and divergence flags, source signal and
//! gain. No terminator; records run to the end of the payload.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::element::{ElementKind, ObjectClass, ObjectMetadata};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "AOD";

const RECORD_BITS: u64 = 68;

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let objects: Vec<(u16, &ObjectMetadata)> = model
        .elements
        .iter()
        .filter_map(|e| match &e.kind {
            ElementKind::Object(md) => Some((e.id, md)),
            ElementKind::Bed(_) => None,
        })
        .collect();
    if state.objects_written >= objects.len() {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for &(id, md) in &objects[state.objects_written..] {
        if bs.position() + RECORD_BITS > budget {
            break;
        }
        bs.put_n(12, id)?;
        bs.put_n(4, md.class as u8)?;
        bs.put(md.dynamic_updates)?;
        bs.put_n(10, md.x)?;
        bs.put_n(10, md.y)?;
        bs.put_n(10, md.z)?;
        bs.put_n(5, md.size)?;
        bs.put(md.size_3d)?;
        bs.put(md.diverge)?;
        bs.put_n(8, md.source)?;
        bs.put_n(6, md.gain)?;
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::AudioObjectDesc as u8, &bs.finish()?)?;
    state.objects_written += count;
    Ok(if state.objects_written == objects.len() {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= RECORD_BITS {
        let id = read_checked(&mut bs, 12, PAYLOAD, "object id", nonzero)? as u16;
        let class = read_checked(&mut bs, 4, PAYLOAD, "object class", |v| {
            ObjectClass::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let dynamic_updates = bs.get()?;
        let x = read_checked(&mut bs, 10, PAYLOAD, "x position", nonzero)? as u16;
        let y = read_checked(&mut bs, 10, PAYLOAD, "y position", nonzero)? as u16;
        let z = read_checked(&mut bs, 10, PAYLOAD, "z position", nonzero)? as u16;
        let size: u8 = bs.get_n(5)?;
        let size_3d = bs.get()?;
        let diverge = bs.get()?;
        let source = read_checked(&mut bs, 8, PAYLOAD, "source signal", nonzero)? as u8;
        let gain: u8 = bs.get_n(6)?;
        let md = ObjectMetadata {
            class,
            x,
            y,
            z,
            size,
            size_3d,
            diverge,
            dynamic_updates,
            gain,
            source,
        };
        model.add_object(id, md).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_round_trip() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        let mut md = ObjectMetadata::default();
        md.class = ObjectClass::Dialogue;
        md.set_position(-0.5, 1.0, 0.25)?;
        md.source = 7;
        md.diverge = true;
        model.add_object(3, md)?;
        model.add_object(4, ObjectMetadata::default())?;

        let mut state = WriteState::new();
        let mut buf = [0u8; 64];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        // Two 68-bit records pack into 17 bytes plus 2 framing bytes.
        assert_eq!(len, 19);

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.element(3).unwrap().kind, model.element(3).unwrap().kind);
        assert_eq!(decoded.element(4).unwrap().kind, model.element(4).unwrap().kind);
        Ok(())
    }

    #[test]
    fn reserved_position_code_is_rejected() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.add_object(1, ObjectMetadata::default())?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 32];
        let mut w = KlvWriter::new(&mut buf);
        write(&model, &mut state, &mut w)?;
        let len = w.position();
        // Zero the 10-bit x field (bits 17..26 of the value).
        buf[4] &= !0x7F;
        buf[5] &= !0xE0;

        let mut decoded = PmdModel::new();
        let err = read(&mut decoded, &buf[2..len]).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueReserved);
        Ok(())
    }

    #[test]
    fn trailing_padding_is_not_a_record() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.add_object(1, ObjectMetadata::default())?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 32];
        let mut w = KlvWriter::new(&mut buf);
        write(&model, &mut state, &mut w)?;
        let len = w.position();

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.elements().count(), 1);
        Ok(())
    }
}
