//! Audio presentation names (APN) payload.
//!
//! One record per localized name: 9-bit presentation id, language code, then
//! NUL-terminated text bytes. Reading a name refreshes it in the registry
//! exactly like a local caller would, so stale names age out over cycles.

use crate::klv::reader::read_checked;
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::lang::LangCode;
use crate::model::names::MAX_NAME_LENGTH;
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "APN";

/// Smallest record: header plus an empty NUL-terminated text.
const MIN_RECORD_BITS: u64 = 32;

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.names.len();
    if state.names_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for (_, name) in model.names.iter().skip(state.names_written) {
        let bits = 24 + (name.text.len() as u64 + 1) * 8;
        if bs.position() + bits > budget {
            break;
        }
        bs.put_n(9, name.presid)?;
        for c in name.lang.chars() {
            bs.put_n(5, LangCode::encode_char(c))?;
        }
        bs.put_bytes(name.text.as_bytes())?;
        bs.put_n(8, 0u8)?;
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::AudioPresentationNames as u8, &bs.finish()?)?;
    state.names_written += count;
    Ok(if state.names_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let presid: u16 = bs.get_n(9)?;
        if presid == 0 {
            break;
        }
        let mut chars = [0u8; 3];
        for c in &mut chars {
            *c = read_checked(&mut bs, 5, PAYLOAD, "language character", |v| {
                if v <= 26 {
                    Ok(LangCode::decode_char(v as u8))
                } else {
                    Err(PayloadStatus::ValueReserved)
                }
            })?;
        }
        let lang = LangCode::from_chars(chars);
        let mut text = Vec::new();
        loop {
            let byte: u8 = bs.get_n(8)?;
            if byte == 0 {
                break;
            }
            if text.len() == MAX_NAME_LENGTH {
                return Err(KlvError::Field {
                    payload: PAYLOAD,
                    field: "name length",
                    value: (text.len() + 1) as u64,
                    status: PayloadStatus::ValueOutOfRange,
                });
            }
            text.push(byte);
        }
        let text = String::from_utf8(text).map_err(|_| KlvError::Field {
            payload: PAYLOAD,
            field: "name text",
            value: presid as u64,
            status: PayloadStatus::IncorrectStructure,
        })?;
        model
            .set_presentation_name(presid, lang, &text)
            .map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}
