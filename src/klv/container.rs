//! Mandatory container payloads: container config and bitstream version.
//!
//! Both are plain two-byte values. The container config doubles its high
//! byte as a format version that must be zero; dynamic tag assignments that
//! may follow the sample offset are ignored on read and never written.

use crate::klv::writer::{KlvWriter, Written};
use crate::klv::{BITSTREAM_VERSION_MAJOR, BITSTREAM_VERSION_MINOR, LocalTag, WriteState};
use crate::model::PmdModel;
use crate::utils::errors::KlvError;

const CONFIG_BYTES: usize = 2;
const VERSION_BYTES: usize = 2;

pub(super) fn write_config(
    model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    if state.config_written {
        return Ok(Written::Yes);
    }
    if w.value_space() < CONFIG_BYTES {
        return Ok(Written::No);
    }
    w.commit_local(LocalTag::Config as u8, &model.sample_offset.to_be_bytes())?;
    state.config_written = true;
    Ok(Written::Yes)
}

pub(super) fn read_config(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    if value.len() < CONFIG_BYTES {
        return Err(KlvError::LengthMismatch {
            payload: "container config",
            length: value.len(),
            expected: CONFIG_BYTES,
        });
    }
    if value[0] != 0 {
        return Err(KlvError::BadContainerVersion(value[0]));
    }
    model.sample_offset = u16::from_be_bytes([value[0], value[1]]);
    Ok(())
}

pub(super) fn write_version(
    _model: &PmdModel,
    state: &mut WriteState,
    w: &mut KlvWriter,
) -> Result<Written, KlvError> {
    if state.version_written {
        return Ok(Written::Yes);
    }
    if w.value_space() < VERSION_BYTES {
        return Ok(Written::No);
    }
    w.commit_local(
        LocalTag::Version as u8,
        &[BITSTREAM_VERSION_MAJOR, BITSTREAM_VERSION_MINOR],
    )?;
    state.version_written = true;
    Ok(Written::Yes)
}

pub(super) fn read_version(model: &mut PmdModel, value: &[u8]) -> Result<(), KlvError> {
    if value.len() != VERSION_BYTES {
        return Err(KlvError::LengthMismatch {
            payload: "version",
            length: value.len(),
            expected: VERSION_BYTES,
        });
    }
    let (maj, min) = (value[0], value[1]);
    if maj != BITSTREAM_VERSION_MAJOR {
        return Err(KlvError::VersionMismatch {
            found_maj: maj,
            found_min: min,
            expected: BITSTREAM_VERSION_MAJOR,
        });
    }
    model.version = Some((maj, min));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips() -> anyhow::Result<()> {
        let mut model = PmdModel::new();
        model.set_sample_offset(160)?;
        let mut state = WriteState::new();
        let mut buf = [0u8; 8];
        let mut w = KlvWriter::new(&mut buf);
        assert_eq!(write_config(&model, &mut state, &mut w)?, Written::Yes);
        let len = w.position();
        assert_eq!(&buf[..len], &[0x01, 0x02, 0x00, 160]);

        let mut decoded = PmdModel::new();
        read_config(&mut decoded, &buf[2..len])?;
        assert_eq!(decoded.sample_offset(), 160);
        Ok(())
    }

    #[test]
    fn nonzero_config_version_is_rejected() {
        let mut model = PmdModel::new();
        assert!(matches!(
            read_config(&mut model, &[0x01, 0x00]),
            Err(KlvError::BadContainerVersion(1))
        ));
    }

    #[test]
    fn incompatible_major_version_is_rejected() {
        let mut model = PmdModel::new();
        assert!(matches!(
            read_version(&mut model, &[BITSTREAM_VERSION_MAJOR + 1, 0]),
            Err(KlvError::VersionMismatch { .. })
        ));
        assert!(read_version(&mut model, &[BITSTREAM_VERSION_MAJOR, 3]).is_ok());
        assert_eq!(model.version(), Some((BITSTREAM_VERSION_MAJOR, 3)));
    }
}
