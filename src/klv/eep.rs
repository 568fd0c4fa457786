//! EAC3 encoding parameters (EEP) payload.
//!
//! Records carry an 8-bit id, three presence-gated blocks (encoder,
//! bitstream, DRC) and the affected presentation ids terminated by a 9-bit
//! zero.

use crate::klv::reader::read_checked;
use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{LocalTag, WriteState, model_err};
use crate::model::PmdModel;
use crate::model::eep::{
    BitstreamBlock, CompressionMode, DrcBlock, EncoderBlock, EncoderParams,
};
use crate::utils::bitstream_io::{BsIoSliceReader, BsIoVecWriter};
use crate::utils::errors::{KlvError, PayloadStatus};

const PAYLOAD: &str = "EEP";

/// Smallest record: id, three cleared presence bits and the terminator.
const MIN_RECORD_BITS: u64 = 20;

const ENCODER_BITS: u64 = 12;
const BITSTREAM_BITS: u64 = 24;
const DRC_BITS: u64 = 15;

fn record_bits(eep: &EncoderParams) -> u64 {
    let mut bits = 11 + (eep.presentations().len() as u64 + 1) * 9;
    if eep.encoder.is_some() {
        bits += ENCODER_BITS;
    }
    if eep.bitstream.is_some() {
        bits += BITSTREAM_BITS;
    }
    if eep.drc.is_some() {
        bits += DRC_BITS;
    }
    bits
}

fn compression(
    bs: &mut BsIoSliceReader<'_>,
    field: &'static str,
) -> Result<CompressionMode, KlvError> {
    read_checked(bs, 3, PAYLOAD, field, |v| {
        CompressionMode::from_code(v as u8).ok_or(PayloadStatus::ValueReserved)
    })
}

pub(super) fn write(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    let total = model.eep.len();
    if state.eep_written >= total {
        return Ok(Written::Yes);
    }

    let budget = (w.value_space() * 8) as u64;
    let mut bs = BsIoVecWriter::default();
    let mut count = 0;
    for eep in &model.eep[state.eep_written..] {
        if bs.position() + record_bits(eep) > budget {
            break;
        }
        bs.put_n(8, eep.id)?;
        match &eep.encoder {
            Some(enc) => {
                bs.put(true)?;
                bs.put_n(3, enc.dynrng_prof as u8)?;
                bs.put_n(3, enc.compr_prof as u8)?;
                bs.put(enc.surround90)?;
                bs.put_n(5, enc.hmixlev)?;
            }
            None => bs.put(false)?,
        }
        match &eep.bitstream {
            Some(bsi) => {
                bs.put(true)?;
                bs.put_n(3, bsi.bsmod)?;
                bs.put_n(2, bsi.dsurmod)?;
                bs.put_n(5, bsi.dialnorm)?;
                bs.put_n(2, bsi.dmixmod)?;
                bs.put_n(3, bsi.ltrtcmixlev)?;
                bs.put_n(3, bsi.ltrtsurmixlev)?;
                bs.put_n(3, bsi.lorocmixlev)?;
                bs.put_n(3, bsi.lorosurmixlev)?;
            }
            None => bs.put(false)?,
        }
        match &eep.drc {
            Some(drc) => {
                bs.put(true)?;
                bs.put_n(3, drc.port_speaker as u8)?;
                bs.put_n(3, drc.port_headphone as u8)?;
                bs.put_n(3, drc.flat_panel as u8)?;
                bs.put_n(3, drc.home_theatre as u8)?;
                bs.put_n(3, drc.ddplus as u8)?;
            }
            None => bs.put(false)?,
        }
        for &presid in eep.presentations() {
            bs.put_n(9, presid)?;
        }
        bs.put_n(9, 0u16)?;
        count += 1;
    }
    if count == 0 {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::Eac3EncodingParameters as u8, &bs.finish()?)?;
    state.eep_written += count;
    Ok(if state.eep_written == total {
        Written::Yes
    } else {
        Written::No
    })
}

pub(super) fn read(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    let mut bs = BsIoSliceReader::from_slice(value);
    while bs.available()? >= MIN_RECORD_BITS {
        let id: u8 = bs.get_n(8)?;
        let mut eep = EncoderParams::new(id);
        if bs.get()? {
            eep.encoder = Some(EncoderBlock {
                dynrng_prof: compression(&mut bs, "dynrng profile")?,
                compr_prof: compression(&mut bs, "compr profile")?,
                surround90: bs.get()?,
                hmixlev: bs.get_n(5)?,
            });
        }
        if bs.get()? {
            eep.bitstream = Some(BitstreamBlock {
                bsmod: bs.get_n(3)?,
                dsurmod: bs.get_n(2)?,
                dialnorm: bs.get_n(5)?,
                dmixmod: bs.get_n(2)?,
                ltrtcmixlev: bs.get_n(3)?,
                ltrtsurmixlev: bs.get_n(3)?,
                lorocmixlev: bs.get_n(3)?,
                lorosurmixlev: bs.get_n(3)?,
            });
        }
        if bs.get()? {
            eep.drc = Some(DrcBlock {
                port_speaker: compression(&mut bs, "speaker DRC profile")?,
                port_headphone: compression(&mut bs, "headphone DRC profile")?,
                flat_panel: compression(&mut bs, "flat panel DRC profile")?,
                home_theatre: compression(&mut bs, "home theatre DRC profile")?,
                ddplus: compression(&mut bs, "DD+ DRC profile")?,
            });
        }
        loop {
            let presid: u16 = bs.get_n(9)?;
            if presid == 0 {
                break;
            }
            eep.add_presentation(presid)
                .map_err(|e| model_err(PAYLOAD, e))?;
        }
        model.add_eep(eep).map_err(|e| model_err(PAYLOAD, e))?;
    }
    Ok(())
}
