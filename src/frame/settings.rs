use bytes::{Buf, BufMut, Bytes};

use crate::error::FrameError;
use crate::frame::head::{Head, Kind, StreamId};

const ACK_FLAG: u8 = 0x1;

pub const DEFAULT_SETTINGS_HEADER_TABLE_SIZE: u32 = 4096;
pub const DEFAULT_INITIAL_WINDOW_SIZE: u32 = 65_535;
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1 << 14;
pub const MAX_MAX_FRAME_SIZE: u32 = (1 << 24) - 1;
pub const MAX_INITIAL_WINDOW_SIZE: u32 = (1 << 31) - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    HeaderTableSize,
    EnablePush,
    MaxConcurrentStreams,
    InitialWindowSize,
    MaxFrameSize,
    MaxHeaderListSize,
}

impl Parameter {
    fn from_u16(id: u16) -> Option<Parameter> {
        match id {
            0x1 => Some(Parameter::HeaderTableSize),
            0x2 => Some(Parameter::EnablePush),
            0x3 => Some(Parameter::MaxConcurrentStreams),
            0x4 => Some(Parameter::InitialWindowSize),
            0x5 => Some(Parameter::MaxFrameSize),
            0x6 => Some(Parameter::MaxHeaderListSize),
            // Unknown identifiers are ignored for forward compatibility
            // (spec.md §3); the caller filters `None` out silently.
            _ => None,
        }
    }

    fn as_u16(&self) -> u16 {
        match *self {
            Parameter::HeaderTableSize => 0x1,
            Parameter::EnablePush => 0x2,
            Parameter::MaxConcurrentStreams => 0x3,
            Parameter::InitialWindowSize => 0x4,
            Parameter::MaxFrameSize => 0x5,
            Parameter::MaxHeaderListSize => 0x6,
        }
    }
}

/// One SETTINGS frame's worth of (parameter, value) pairs, in wire order.
///
/// This is distinct from `proto::settings::Settings`, which is the
/// connection's merged, validated, currently-effective configuration; this
/// type is just the frame codec's view of a single frame's payload.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    ack: bool,
    params: Vec<(Parameter, u32)>,
}

impl Settings {
    pub fn new() -> Settings {
        Settings::default()
    }

    pub fn ack() -> Settings {
        Settings {
            ack: true,
            params: Vec::new(),
        }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn set(&mut self, param: Parameter, value: u32) {
        self.params.push((param, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Parameter, u32)> + '_ {
        self.params.iter().copied()
    }

    pub fn load(head: Head, payload: &Bytes) -> Result<Settings, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let ack = head.flag() & ACK_FLAG == ACK_FLAG;

        if ack {
            if !payload.is_empty() {
                return Err(FrameError::BadFrameSize);
            }
            return Ok(Settings::ack());
        }

        if payload.len() % 6 != 0 {
            return Err(FrameError::PartialSettingLength);
        }

        let mut buf = payload.clone();
        let mut params = Vec::with_capacity(payload.len() / 6);

        while buf.has_remaining() {
            let id = buf.get_u16();
            let value = buf.get_u32();

            if let Some(param) = Parameter::from_u16(id) {
                validate(param, value)?;
                params.push((param, value));
            }
        }

        Ok(Settings { ack: false, params })
    }

    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        let flag = if self.ack { ACK_FLAG } else { 0 };
        let head = Head::new(Kind::Settings, flag, StreamId::CONNECTION);
        head.encode(self.params.len() * 6, dst);

        for (param, value) in &self.params {
            dst.put_u16(param.as_u16());
            dst.put_u32(*value);
        }
    }
}

fn validate(param: Parameter, value: u32) -> Result<(), FrameError> {
    match param {
        Parameter::EnablePush if value > 1 => Err(FrameError::InvalidSettingValue),
        Parameter::InitialWindowSize if value > MAX_INITIAL_WINDOW_SIZE => {
            Err(FrameError::InvalidSettingValue)
        }
        Parameter::MaxFrameSize if value < DEFAULT_MAX_FRAME_SIZE || value > MAX_MAX_FRAME_SIZE => {
            Err(FrameError::InvalidSettingValue)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::head::HEADER_LEN;

    fn head(flag: u8) -> Head {
        Head::new(Kind::Settings, flag, StreamId::CONNECTION)
    }

    #[test]
    fn ack_with_nonempty_payload_is_rejected() {
        let payload = Bytes::from_static(&[0, 0, 0, 0]);
        assert!(matches!(Settings::load(head(ACK_FLAG), &payload), Err(FrameError::BadFrameSize)));
    }

    #[test]
    fn ack_on_nonzero_stream_is_rejected() {
        let head = Head::new(Kind::Settings, ACK_FLAG, StreamId::new(1));
        assert!(matches!(Settings::load(head, &Bytes::new()), Err(FrameError::InvalidStreamId)));
    }

    #[test]
    fn payload_not_a_multiple_of_six_is_rejected() {
        for len in [1usize, 5, 7, 11, 13] {
            let payload = Bytes::from(vec![0u8; len]);
            assert!(
                matches!(Settings::load(head(0), &payload), Err(FrameError::PartialSettingLength)),
                "length {len} should have been rejected"
            );
        }
    }

    #[test]
    fn unknown_parameter_ids_are_silently_ignored() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x99u16.to_be_bytes());
        payload.extend_from_slice(&42u32.to_be_bytes());
        let settings = Settings::load(head(0), &Bytes::from(payload)).unwrap();
        assert_eq!(settings.iter().count(), 0);
    }

    #[test]
    fn duplicate_parameter_keys_are_both_kept_in_order() {
        // RFC 9113 leaves duplicate keys within a frame as "the last one
        // wins" at the application-settings layer; the frame codec itself
        // just preserves wire order for that layer to resolve.
        let mut payload = Vec::new();
        for value in [100u32, 200] {
            payload.extend_from_slice(&0x4u16.to_be_bytes());
            payload.extend_from_slice(&value.to_be_bytes());
        }
        let settings = Settings::load(head(0), &Bytes::from(payload)).unwrap();
        let values: Vec<u32> = settings.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![100, 200]);
    }

    #[test]
    fn invalid_parameter_values_are_rejected() {
        for (param, value) in [
            (Parameter::EnablePush, 2u32),
            (Parameter::InitialWindowSize, MAX_INITIAL_WINDOW_SIZE + 1),
            (Parameter::MaxFrameSize, DEFAULT_MAX_FRAME_SIZE - 1),
            (Parameter::MaxFrameSize, MAX_MAX_FRAME_SIZE + 1),
        ] {
            assert!(
                matches!(validate(param, value), Err(FrameError::InvalidSettingValue)),
                "{param:?} = {value} should have been rejected"
            );
        }
    }

    #[test]
    fn encode_then_load_preserves_params() {
        let mut settings = Settings::new();
        settings.set(Parameter::MaxConcurrentStreams, 50);
        settings.set(Parameter::InitialWindowSize, 65_535);

        let mut buf = bytes::BytesMut::new();
        settings.encode(&mut buf);

        let (parsed_head, length) = Head::parse(&buf[..HEADER_LEN]);
        let payload = Bytes::copy_from_slice(&buf[HEADER_LEN..HEADER_LEN + length as usize]);
        let loaded = Settings::load(parsed_head, &payload).unwrap();
        assert_eq!(loaded.iter().collect::<Vec<_>>(), settings.iter().collect::<Vec<_>>());
    }
}
