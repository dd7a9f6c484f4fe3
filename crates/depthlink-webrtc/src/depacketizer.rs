//! H.264 RTP payload → Annex-B access units (RFC 6184).
//!
//! Handles single NAL units (1–23), STAP-A (24), FU-A (28) and FU-B (29).
//! An access unit is flushed when the RTP timestamp moves on or when the
//! marker bit closes it.

use bytes::{BufMut, BytesMut};
use depthlink_core::AccessUnit;

const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const NAL_STAP_A: u8 = 24;
const NAL_FU_A: u8 = 28;
const NAL_FU_B: u8 = 29;

#[derive(Debug)]
pub struct H264Depacketizer {
    unit: BytesMut,
    unit_timestamp: Option<u32>,
    /// NAL under reassembly from FU-A/FU-B fragments.
    fragment: BytesMut,
    in_fragment: bool,
}

impl Default for H264Depacketizer {
    fn default() -> Self {
        Self::new()
    }
}

impl H264Depacketizer {
    pub fn new() -> Self {
        Self {
            unit: BytesMut::with_capacity(256 * 1024),
            unit_timestamp: None,
            fragment: BytesMut::with_capacity(64 * 1024),
            in_fragment: false,
        }
    }

    /// Feed one RTP payload. Returns an access unit when one completes.
    ///
    /// A timestamp change flushes the previous unit before this payload is
    /// consumed, so a lost marker packet costs at most one frame of latency.
    pub fn push(&mut self, payload: &[u8], timestamp: u32, marker: bool) -> Option<AccessUnit> {
        if payload.is_empty() {
            return None;
        }

        let mut flushed = None;
        if self.unit_timestamp.is_some_and(|ts| ts != timestamp) {
            flushed = self.take_unit();
            // A fragment cannot span pictures
            self.fragment.clear();
            self.in_fragment = false;
        }
        self.unit_timestamp = Some(timestamp);
        self.consume(payload);

        if marker {
            // Both complete: the previous picture lost its marker packet and
            // this one closed in a single packet. Keep the newer one.
            if let Some(current) = self.take_unit() {
                return Some(current);
            }
        }
        flushed
    }

    fn take_unit(&mut self) -> Option<AccessUnit> {
        let timestamp = self.unit_timestamp?;
        if self.unit.is_empty() {
            return None;
        }
        Some(AccessUnit { data: self.unit.split().freeze(), timestamp })
    }

    fn consume(&mut self, payload: &[u8]) {
        let header = payload[0];
        match header & 0x1F {
            NAL_STAP_A => self.consume_stap_a(&payload[1..]),
            NAL_FU_A if payload.len() >= 2 => self.consume_fragment(header, payload[1], &payload[2..]),
            // FU-B carries a 16-bit decoding order number after the FU header
            NAL_FU_B if payload.len() >= 4 => self.consume_fragment(header, payload[1], &payload[4..]),
            NAL_FU_A | NAL_FU_B => {}
            _ => self.append_nal(payload),
        }
    }

    fn consume_stap_a(&mut self, mut data: &[u8]) {
        while data.len() >= 2 {
            let size = u16::from_be_bytes([data[0], data[1]]) as usize;
            data = &data[2..];
            if size > data.len() {
                break;
            }
            let (nal, rest) = data.split_at(size);
            self.append_nal(nal);
            data = rest;
        }
    }

    fn consume_fragment(&mut self, indicator: u8, fu_header: u8, body: &[u8]) {
        let start = fu_header & 0x80 != 0;
        let end = fu_header & 0x40 != 0;

        if start {
            self.fragment.clear();
            // Reconstructed NAL header: F|NRI from the indicator, type from the FU header
            self.fragment.put_u8((indicator & 0xE0) | (fu_header & 0x1F));
            self.in_fragment = true;
        }
        if !self.in_fragment {
            // Missed the start fragment; drop until the next one
            return;
        }
        self.fragment.extend_from_slice(body);

        if end {
            self.unit.extend_from_slice(&START_CODE);
            let nal = self.fragment.split();
            self.unit.extend_from_slice(&nal);
            self.in_fragment = false;
        }
    }

    fn append_nal(&mut self, nal: &[u8]) {
        if nal.is_empty() {
            return;
        }
        self.unit.extend_from_slice(&START_CODE);
        self.unit.extend_from_slice(nal);
    }
}
