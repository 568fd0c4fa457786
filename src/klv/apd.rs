//! Audio presentation description (APD) payload.
//!
//! One record per presentation: 9-bit id, 5-bit speaker config, a three
//! character language code packed 5 bits per character, then the referenced
//! element ids terminated by a 12-bit zero. A presentation is only written
//! once all of its elements are on the wire.

use crate::klv::reader::{nonzero, read_checked};
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, element_written, model_err};
use crate::model::PmdModel;
use crate::model::element::{ElementId, SpeakerConfig};
use crate::model::lang::LangCode;
use crate::model::presentation::Presentation;
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "APD";

/// Smallest record: fixed header plus the terminator.
const MIN_RECORD_BITS: u64 = 41;

fn record_bits(pres: &Presentation) -> u64 {
    29 + 12 * (pres.num_elements() as u64 + 1)
}

fn put_lang(bs: &mut BsIoVecWriter, lang: LangCode) -> std::io::Result<()> {
    for c in lang.chars() {
        bs.put_n(5, LangCode::encode_char(c))?;
    }
    Ok(())
}

fn read_lang(bs: &mut BsIoSliceReader<'_>) -> Result<LangCode, KlvError> {
    let mut chars = [0u8; 3];
    for c in &mut chars {
        *c = read_checked(bs, 5, PAYLOAD, "language character", |v| {
            if v <= 26 {
                Ok(LangCode::decode_char(v as u8))
            } else {
                Err(PayloadStatus::ValueReserved)
            }
        })?;
    }
    Ok(LangCode::from_chars(chars))
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.presentations.len();
    if state.presentations_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for pres in &model.presentations[state.presentations_written..] {
        let deferred = pres
            .element_indices()
            .any(|idx| !element_written(model, state, idx));
        if deferred || bs.position() + record_bits(pres) > budget {
            break;
        }
        bs.put_n(9, pres.id)?;
        bs.put_n(5, pres.config as u8)?;
        put_lang(&mut bs, pres.lang)?;
        for idx in pres.element_indices() {
            bs.put_n(12, model.elements[idx].id)?;
        }
        bs.put_n(12, 0u16)?;
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::AudioPresentationDesc as u8, &bs.finish()?)?;
    state.presentations_written += count;
    Ok(if state.presentations_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let id = read_checked(&mut bs, 9, PAYLOAD, "presentation id", nonzero)? as u16;
        let config = read_checked(&mut bs, 5, PAYLOAD, "speaker config", |v| {
            SpeakerConfig::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let lang = read_lang(&mut bs)?;
        let mut element_ids: Vec<ElementId> = Vec::new();
        loop {
            let eid: u16 = bs.get_n(12)?;
            if eid == 0 {
                break;
            }
            element_ids.push(eid);
        }
        model
            .add_presentation(id, config, lang, &element_ids)
            .map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::element::ObjectMetadata;
    use crate::model::profile::EntityKind;

    fn model_with_elements() -> anyhow::Result<PmdModel> {
        let mut model = PmdModel::new();
        model.add_object(10, ObjectMetadata::default())?;
        model.add_object(20, ObjectMetadata::default())?;
        Ok(model)
    }

    fn write_all(model: &PmdModel, state: &mut WriteState) -> anyhow::Result<Vec<u8>> {
        let mut buf = [0u8; 128];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(model, state, &mut w)?, Written::Yes);
        let len = w.position();
        Ok(buf[..len].to_vec())
    }

    #[test]
    fn presentation_round_trips() -> anyhow::Result<()> {
        let mut model = model_with_elements()?;
        model.add_presentation(5, SpeakerConfig::Surround51, LangCode::new("fra")?, &[10, 20])?;

        let mut state = WriteState::new();
        state.objects_written = 2;
        let framed = write_all(&model, &mut state)?;

        let mut decoded = model_with_elements()?;
        read(&mut decoded, &framed[2..])?;
        let pres = decoded.presentation(5).unwrap();
        assert_eq!(pres.config, SpeakerConfig::Surround51);
        assert_eq!(pres.lang, LangCode::new("fra")?);
        assert_eq!(pres.num_elements(), 2);
        Ok(())
    }

    #[test]
    fn unresolved_element_is_a_dangling_reference() -> anyhow::Result<()> {
        let mut model = model_with_elements()?;
        model.add_presentation(5, SpeakerConfig::Stereo, LangCode::new("eng")?, &[10])?;
        let mut state = WriteState::new();
        state.objects_written = 2;
        let framed = write_all(&model, &mut state)?;

        // Read into a model that never saw the elements.
        let mut decoded = PmdModel::new();
        let err = read(&mut decoded, &framed[2..]).unwrap_err();
        assert!(matches!(
            err,
            KlvError::DanglingReference {
                kind: EntityKind::Element,
                id: 10,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn held_back_until_elements_are_written() -> anyhow::Result<()> {
        let mut model = model_with_elements()?;
        model.add_presentation(1, SpeakerConfig::Stereo, LangCode::new("eng")?, &[10, 20])?;

        let mut state = WriteState::new();
        state.objects_written = 1;
        let mut buf = [0u8; 128];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::No);
        assert_eq!(state.presentations_written, 0);

        state.objects_written = 2;
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        assert_eq!(state.presentations_written, 1);
        Ok(())
    }
}
