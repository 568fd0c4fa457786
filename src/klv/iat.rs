//! Identity and timing (IAT) payload.
//!
//! A singleton record: a two-bit format version (always zero), optional
//! content and distribution identities, the 35-bit timestamp, optional
//! sample offset and validity duration, and free-form user data and
//! extension byte strings.

use crate::klv::reader::read_checked;
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::iat::{
    ContentId, ContentIdType, DistributionId, DistributionIdType, IdentityTiming,
};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "IAT";

fn payload_bits(iat: &IdentityTiming) -> u64 {
    let mut bits = 43;
    if let Some(cid) = &iat.content_id {
        bits += 10 + cid.data.len() as u64 * 8;
    }
    if let Some(did) = &iat.distribution_id {
        bits += 7 + did.data.len() as u64 * 8;
    }
    if iat.offset.is_some() {
        bits += 11;
    }
    if iat.validity_duration.is_some() {
        bits += 11;
    }
    if !iat.user_data.is_empty() {
        bits += 8 + iat.user_data.len() as u64 * 8;
    }
    if !iat.extension.is_empty() {
        bits += 8 + iat.extension.len() as u64 * 8;
    }
    bits
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let Some(iat) = &model.iat else {
        return Ok(Written::Yes);
    };
    if state.iat_written {
        return Ok(Written::Yes);
    }
    if payload_bits(iat) > (w.value_space() * 8) as u64 {
        return Ok(Written::No);
    }

    let mut bs = BsIoVecWriter::default();
    bs.put_n(2, 0u8)?;
    match &iat.content_id {
        Some(cid) => {
            bs.put(true)?;
            bs.put_n(5, cid.id_type as u8)?;
            bs.put_n(5, cid.data.len() as u8 - 1)?;
            bs.put_bytes(&cid.data)?;
        }
        None => bs.put(false)?,
    }
    match &iat.distribution_id {
        Some(did) => {
            bs.put(true)?;
            bs.put_n(3, did.id_type as u8)?;
            bs.put_n(4, did.data.len() as u8 - 1)?;
            bs.put_bytes(&did.data)?;
        }
        None => bs.put(false)?,
    }
    bs.put_n(35, iat.timestamp)?;
    match iat.offset {
        Some(offset) => {
            bs.put(true)?;
            bs.put_n(11, offset)?;
        }
        None => bs.put(false)?,
    }
    match iat.validity_duration {
        Some(duration) => {
            bs.put(true)?;
            bs.put_n(11, duration)?;
        }
        None => bs.put(false)?,
    }
    for bytes in [&iat.user_data, &iat.extension] {
        if bytes.is_empty() {
            bs.put(false)?;
        } else {
            bs.put(true)?;
            bs.put_n(8, bytes.len() as u8 - 1)?;
            bs.put_bytes(bytes)?;
        }
    }
    w.commit_local(LocalTag::IdentityTiming as u8, &bs.finish()?)?;
    state.iat_written = true;
    Ok(Written::Yes)
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    read_checked(&mut bs, 2, PAYLOAD, "version", |v| {
        if v == 0 {
            Ok(())
        } else {
            Err(PayloadStatus::ValueOutOfRange)
        }
    })?;

    let mut iat = IdentityTiming::default();
    if bs.get()? {
        let id_type = read_checked(&mut bs, 5, PAYLOAD, "content id type", |v| {
            ContentIdType::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let len = bs.get_n::<u8>(5)? as usize + 1;
        let mut data = vec![0u8; len];
        bs.get_bytes(&mut data)?;
        iat.content_id = Some(ContentId::new(id_type, data).map_err(|e| model_err(PAYLOAD, e))?);
    }
    if bs.get()? {
        let id_type = read_checked(&mut bs, 3, PAYLOAD, "distribution id type", |v| {
            DistributionIdType::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
        })?;
        let len = bs.get_n::<u8>(4)? as usize + 1;
        let mut data = vec![0u8; len];
        bs.get_bytes(&mut data)?;
        iat.distribution_id =
            Some(DistributionId::new(id_type, data).map_err(|e| model_err(PAYLOAD, e))?);
    }
    iat.timestamp = bs.get_n(35)?;
    if bs.get()? {
        iat.offset = Some(bs.get_n(11)?);
    }
    if bs.get()? {
        iat.validity_duration = Some(bs.get_n(11)?);
    }
    if bs.get()? {
        let len = bs.get_n::<u8>(8)? as usize + 1;
        iat.user_data = vec![0u8; len];
        bs.get_bytes(&mut iat.user_data)?;
    }
    if bs.get()? {
        let len = bs.get_n::<u8>(8)? as usize + 1;
        iat.extension = vec![0u8; len];
        bs.get_bytes(&mut iat.extension)?;
    }
    model.set_iat(iat).map_err(|e| model_err(PAYLOAD, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_record_round_trips() -> anyhow::Result<()> {
        let mut iat = IdentityTiming::new(0x3_FFFF_FFFF)?;
        iat.content_id = Some(ContentId::new(ContentIdType::Uuid, vec![0xAB; 16])?);
        iat.distribution_id = Some(DistributionId::new(
            DistributionIdType::Atsc3,
            vec![1, 2, 3],
        )?);
        iat.offset = Some(2047);
        iat.validity_duration = Some(1);
        iat.user_data = vec![9, 8, 7];
        iat.extension = vec![0x55];

        let mut model = PmdModel::new();
        model.set_iat(iat.clone())?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 128];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        assert_eq!(
            (len - 2) as u64,
            payload_bits(&iat).div_ceil(8),
            "length matches the size estimate"
        );

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.iat(), Some(&iat));
        Ok(())
    }

    #[test]
    fn minimal_record_round_trips() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.set_iat(IdentityTiming::new(240_000)?)?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 16];
        let mut w = KlvWriter::new(&mut buf);
        write(&model, &mut state, &mut w)?;
        let len = w.position();
        // 43 bits pack into 6 bytes.
        assert_eq!(len, 8);

        let mut decoded = PmdModel::new();
        read(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.iat().unwrap().timestamp, 240_000);
        Ok(())
    }

    #[test]
    fn nonzero_version_is_rejected() {
        let mut model = PmdModel::new();
        let err = read(&mut model, &[0x40, 0, 0, 0, 0, 0]).unwrap_err();
        assert_eq!(err.status(), PayloadStatus::ValueOutOfRange);
    }
}
