//! The per-connection message writer.
//!
//! Owns the fixed slot table and the three intrusive lists over it:
//!
//! - `order_list`: every live slot, oldest first (window accounting,
//!   cancellation, teardown walks)
//! - `write_list`: slots with bytes still to emit, in scheduling order
//! - `cache_list`: free slots
//!
//! A slot is always on exactly one of `cache_list`/`order_list`; while on
//! `order_list` it is additionally on `write_list` iff fragment work
//! remains. The difference `order - write` is the count of messages holding
//! their slot while awaiting a peer response.

use std::fmt;

use muxrpc_proto::packet::{header_flags, HEADER_SIZE, MAX_PACKET_BODY_SIZE, MAX_PACKET_DATA_SIZE};
use muxrpc_proto::{
    ConnectionContext, MessageBundle, MessageFlags, MessageId, MessagePtr, PacketHeader,
    PacketKind, Payload, Protocol, END_MESSAGE_FLAG,
};
use tracing::{debug, trace};

use crate::config::{WriteFlags, WriterConfig};
use crate::error::{WriteError, WriteErrorKind};
use crate::inner_list::InnerList;
use crate::sender::Sender;
use crate::slot::{MessageSlot, SlotState, RING_CACHE, RING_ORDER, RING_WRITE};

#[derive(Default)]
struct PacketOptions {
    packet_kind: u8,
    request_accept: bool,
}

pub struct MessageWriter {
    slots: Vec<MessageSlot>,
    order_list: InnerList,
    write_list: InnerList,
    cache_list: InnerList,
    current_synchronous: Option<usize>,
    /// Serializer parked after a completion, handed to the next message.
    parked_serializer: Option<muxrpc_codec::Serializer>,
    /// Message whose fragment closed the previous packet and is still
    /// mid-flight; its next fragment may open a packet as a continuation.
    last_packet_tail: Option<usize>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            order_list: InnerList::new(RING_ORDER),
            write_list: InnerList::new(RING_WRITE),
            cache_list: InnerList::new(RING_CACHE),
            current_synchronous: None,
            parked_serializer: None,
            last_packet_tail: None,
        }
    }

    /// Size the slot table for the configured windows.
    ///
    /// The table must not grow afterwards: serializers keep state tied to
    /// slot indices for the connection's lifetime.
    pub fn prepare(&mut self, config: &WriterConfig) {
        let count = config.slot_count();
        self.slots = (0..count).map(|_| MessageSlot::default()).collect();
        for index in 0..count {
            self.cache_list.push_back(&mut self.slots, index);
        }
    }

    pub fn unprepare(&mut self) {
        self.slots.clear();
        self.order_list = InnerList::new(RING_ORDER);
        self.write_list = InnerList::new(RING_WRITE);
        self.cache_list = InnerList::new(RING_CACHE);
        self.current_synchronous = None;
        self.parked_serializer = None;
        self.last_packet_tail = None;
    }

    /// The multiplex window is saturated.
    pub fn is_full(&self, config: &WriterConfig) -> bool {
        self.write_list.len() >= config.max_message_count_multiplex
    }

    /// No message holds a slot.
    pub fn is_empty(&self) -> bool {
        self.order_list.is_empty()
    }

    pub fn order_count(&self) -> usize {
        self.order_list.len()
    }

    pub fn write_count(&self) -> usize {
        self.write_list.len()
    }

    pub fn cache_count(&self) -> usize {
        self.cache_list.len()
    }

    /// The next scheduled message carries relayed data.
    pub fn front_is_relayed(&self) -> bool {
        self.write_list
            .front()
            .map(|index| self.slots[index].is_relayed())
            .unwrap_or(false)
    }

    /// Accept a message for sending.
    ///
    /// Returns `None` (rejecting the bundle stays with the caller) when the
    /// multiplex window is saturated, no slot is free, or the bundle waits
    /// for a response and the response-wait window is saturated.
    pub fn enqueue(
        &mut self,
        config: &WriterConfig,
        mut bundle: MessageBundle,
        pool_id: MessageId,
    ) -> Option<MessageId> {
        if self.is_full(config) || self.cache_list.is_empty() {
            return None;
        }
        if bundle.waits_response()
            && self.order_list.len() - self.write_list.len()
                >= config.max_message_count_response_wait
        {
            return None;
        }

        bundle
            .flags
            .reset(MessageFlags::STARTED_SEND | MessageFlags::DONE_SEND);

        let index = self.cache_list.pop_front(&mut self.slots)?;
        let relayed = bundle.is_relayed();
        let slot = &mut self.slots[index];
        slot.bundle = Some(bundle);
        slot.pool_id = pool_id;
        slot.packet_count = 0;
        slot.relay_at = 0;
        slot.state = if relayed {
            SlotState::RelayedStart
        } else {
            SlotState::WriteStart
        };
        let id = MessageId::new(index, slot.unique);

        self.order_list.push_back(&mut self.slots, index);
        self.write_list.push_back(&mut self.slots, index);
        trace!(index, unique = id.unique, relayed, "message enqueued");
        Some(id)
    }

    fn id_matches(&self, id: MessageId) -> bool {
        id.is_valid()
            && id.index < self.slots.len()
            && self.slots[id.index].unique == id.unique
    }

    /// Clone the payload of a still-tracked local message.
    pub fn fetch_request(&self, id: MessageId) -> Option<MessagePtr> {
        if !self.id_matches(id) {
            return None;
        }
        self.slots[id.index]
            .bundle
            .as_ref()
            .and_then(|bundle| bundle.message().cloned())
    }

    /// Cancel the message addressed by `id`, returning its bundle and pool
    /// id so the caller can repost or discard it.
    pub fn cancel(&mut self, id: MessageId) -> Option<(MessageBundle, MessageId)> {
        if !self.id_matches(id) {
            return None;
        }
        self.do_cancel(id.index)
    }

    /// Cancel the oldest live message.
    pub fn cancel_oldest(&mut self) -> Option<(MessageBundle, MessageId)> {
        let index = self.order_list.front()?;
        self.do_cancel(index)
    }

    fn do_cancel(&mut self, index: usize) -> Option<(MessageBundle, MessageId)> {
        if self.slots[index].state == SlotState::Canceled {
            trace!(index, "already canceled");
            return None;
        }
        let mut bundle = self.slots[index].bundle.take()?;
        let pool_id = self.slots[index].pool_id;
        bundle.flags.set(MessageFlags::CANCELED);

        let slot = &mut self.slots[index];
        if slot.is_mid_flight() {
            // Bytes are already on the wire; a cancel marker must follow so
            // the peer drops its partial reassembly. The slot keeps its list
            // places until that marker is emitted.
            if let Some(serializer) = slot.serializer.as_mut() {
                serializer.clear();
            }
            slot.serializer = None;
            slot.state = SlotState::Canceled;
            debug!(index, "canceled mid-flight, marker pending");
        } else if bundle.flags.has(MessageFlags::DONE_SEND) {
            // Fully sent, was holding its slot for the response.
            self.order_list.erase(&mut self.slots, index);
            self.release_slot(index);
            debug!(index, "canceled while awaiting response");
        } else {
            // Still queued, nothing on the wire yet.
            self.order_list.erase(&mut self.slots, index);
            self.write_list.erase(&mut self.slots, index);
            self.release_slot(index);
            debug!(index, "canceled before send");
        }
        Some((bundle, pool_id))
    }

    fn release_slot(&mut self, index: usize) {
        self.slots[index].clear();
        self.cache_list.push_front(&mut self.slots, index);
        if self.current_synchronous == Some(index) {
            self.current_synchronous = None;
        }
        if self.last_packet_tail == Some(index) {
            self.last_packet_tail = None;
        }
    }

    /// Walk live messages newest to oldest, letting the connection take
    /// bundles back (return `None` to release the slot, `Some` to keep it).
    pub fn visit_newer_to_older<F>(&mut self, mut visit: F)
    where
        F: FnMut(MessageBundle, MessageId) -> Option<MessageBundle>,
    {
        let mut at = self.order_list.back();
        while let Some(index) = at {
            let prev = self.order_list.prev(&self.slots, index);
            if let Some(bundle) = self.slots[index].bundle.take() {
                let pool_id = self.slots[index].pool_id;
                match visit(bundle, pool_id) {
                    Some(bundle) => self.slots[index].bundle = Some(bundle),
                    None => {
                        if self.write_list.contains(&self.slots, index) {
                            self.write_list.erase(&mut self.slots, index);
                        }
                        self.order_list.erase(&mut self.slots, index);
                        self.release_slot(index);
                    }
                }
            }
            at = prev;
        }
    }

    /// Produce up to `buf.len()` bytes of packets.
    ///
    /// `ackd_count` and `cancel_remote` are consumed as their elements are
    /// written. The relay buffer, when granted through `flags`, is released
    /// through `sender` before this call returns.
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &mut self,
        buf: &mut [u8],
        flags: WriteFlags,
        ackd_count: &mut u8,
        cancel_remote: &mut Vec<MessageId>,
        sender: &mut dyn Sender,
        config: &WriterConfig,
        proto: &dyn Protocol,
        ctx: &mut ConnectionContext,
    ) -> Result<usize, WriteError> {
        let mut at = 0usize;
        let mut more = true;
        let min_free = proto.minimum_free_packet_data_size();

        while more && buf.len() - at >= HEADER_SIZE + min_free {
            let data_start = at + HEADER_SIZE;
            let data_cap = (buf.len() - data_start)
                .min(MAX_PACKET_DATA_SIZE)
                .min(MAX_PACKET_BODY_SIZE);
            let mut options = PacketOptions {
                packet_kind: PacketKind::NewMessage as u8,
                request_accept: false,
            };

            let fill = self
                .fill_packet(
                    &mut buf[data_start..data_start + data_cap],
                    &mut options,
                    flags,
                    ackd_count,
                    cancel_remote,
                    sender,
                    config,
                    proto,
                    ctx,
                )
                .map_err(|kind| WriteError::new(at, kind))?;

            if fill == 0 {
                break;
            }

            let mut size = fill;
            let mut packet_flags = 0u8;
            if let Some(compress) = &config.inplace_compress {
                match compress(&mut buf[data_start..data_start + fill]) {
                    Ok(0) => {}
                    Ok(n) if n < fill => {
                        packet_flags |= header_flags::COMPRESSED;
                        size = n;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        return Err(WriteError::new(at, WriteErrorKind::Compress(err)));
                    }
                }
            }

            if options.request_accept {
                debug_assert!(flags.has(WriteFlags::CAN_SEND_RELAYED_MESSAGES));
                packet_flags |= header_flags::ACK_REQUEST;
                debug!("relay packet requests acknowledgement");
                sender.release_relay_buffer();
                more = false;
            } else if flags.has(WriteFlags::CAN_SEND_RELAYED_MESSAGES) {
                // The grant went unused by this packet; one packet per
                // relay buffer either way.
                trace!("relay grant unused, releasing buffer");
                sender.release_relay_buffer();
                more = false;
            }

            let header = PacketHeader {
                kind: options.packet_kind,
                flags: packet_flags,
                size: size as u16,
            };
            header.store(&mut buf[at..]);
            at = data_start + size;
        }

        if at == 0 {
            if flags.has(WriteFlags::SHOULD_SEND_KEEP_ALIVE) && buf.len() >= HEADER_SIZE {
                let header = PacketHeader::keep_alive();
                at += header.store(buf);
                trace!("keep-alive emitted");
            }
            if flags.has(WriteFlags::CAN_SEND_RELAYED_MESSAGES) {
                trace!("nothing sent, releasing relay buffer");
                sender.release_relay_buffer();
            }
        }
        Ok(at)
    }

    /// Fill one packet body: acknowledgement count first, queued cancel
    /// requests next, then message fragments under the fairness rules.
    #[allow(clippy::too_many_arguments)]
    fn fill_packet(
        &mut self,
        data: &mut [u8],
        options: &mut PacketOptions,
        flags: WriteFlags,
        ackd_count: &mut u8,
        cancel_remote: &mut Vec<MessageId>,
        sender: &mut dyn Sender,
        config: &WriterConfig,
        proto: &dyn Protocol,
        ctx: &mut ConnectionContext,
    ) -> Result<usize, WriteErrorKind> {
        let mut at = 0usize;
        let mut elem_count = 0usize;
        let min_free = proto.minimum_free_packet_data_size();
        let mut tail: Option<usize> = None;

        if *ackd_count != 0 {
            trace!(count = *ackd_count, "writing acknowledged packet count");
            at += proto.store_u8(&mut data[at..], *ackd_count);
            *ackd_count = 0;
            options.packet_kind = PacketKind::AckdCount as u8;
            elem_count += 1;
        }

        while !cancel_remote.is_empty() && data.len() - at >= min_free {
            if elem_count > 0 {
                at += proto.store_u8(&mut data[at..], PacketKind::CancelRequest as u8);
            } else {
                options.packet_kind = PacketKind::CancelRequest as u8;
            }
            // Drained newest-first; the peer does not care about order.
            let Some(id) = cancel_remote.pop() else {
                break;
            };
            at += proto.store_cross(&mut data[at..], id.index as u64);
            at += proto.store_cross(&mut data[at..], id.unique as u64);
            elem_count += 1;
            trace!(index = id.index, unique = id.unique, "cancel request echoed");
        }

        // One iteration per header, body or rotation; the guard bounds
        // pathological skip loops.
        let mut guard = 4 * self.write_list.len();

        while data.len() - at >= min_free && guard > 0 {
            guard -= 1;
            let Some(index) = self.write_list.front() else {
                break;
            };

            // Relay gate: without the grant, relayed slots rotate past.
            if !flags.has(WriteFlags::CAN_SEND_RELAYED_MESSAGES)
                && self.slots[index].is_relayed()
            {
                trace!(index, "relayed message skipped, no grant");
                self.rotate_front();
                continue;
            }

            // Synchronous gate: while one synchronous message is mid-flight
            // every other synchronous message rotates past.
            if let Some(current) = self.current_synchronous {
                if current != index && self.slots[index].is_synchronous() {
                    trace!(index, current, "synchronous message skipped");
                    self.rotate_front();
                    continue;
                }
            }

            match self.slots[index].state {
                SlotState::Canceled => {
                    let kind = PacketKind::CancelMessage as u8;
                    if elem_count > 0 {
                        at += proto.store_u8(&mut data[at..], kind);
                    } else {
                        options.packet_kind = kind;
                    }
                    at += proto.store_cross(&mut data[at..], index as u64);
                    elem_count += 1;
                    self.order_list.erase(&mut self.slots, index);
                    self.write_list.erase(&mut self.slots, index);
                    self.release_slot(index);
                    tail = None;
                    debug!(index, "cancel marker emitted");
                }
                SlotState::WriteStart | SlotState::WriteHead | SlotState::WriteBody => {
                    self.emit_local_fragment(
                        index, data, &mut at, &mut elem_count, &mut tail, options, sender,
                        config, proto, ctx,
                    )?;
                }
                SlotState::RelayedStart | SlotState::RelayedHead | SlotState::RelayedBody => {
                    self.emit_relayed_fragment(
                        index, data, &mut at, &mut elem_count, &mut tail, options, sender,
                        config, proto, ctx,
                    )?;
                }
                SlotState::Empty => {
                    // Completed entries never stay on the write list.
                    debug_assert!(false, "empty slot on write list");
                    self.write_list.erase(&mut self.slots, index);
                }
            }
        }

        self.last_packet_tail = tail;
        trace!(
            write = self.write_list.len(),
            order = self.order_list.len(),
            fill = at,
            "packet body filled"
        );
        Ok(at)
    }

    /// Emit one fragment of a locally serialized message. The caller has
    /// already checked the minimum free span for the element overhead.
    #[allow(clippy::too_many_arguments)]
    fn emit_local_fragment(
        &mut self,
        index: usize,
        data: &mut [u8],
        at: &mut usize,
        elem_count: &mut usize,
        tail: &mut Option<usize>,
        options: &mut PacketOptions,
        sender: &mut dyn Sender,
        config: &WriterConfig,
        proto: &dyn Protocol,
        ctx: &mut ConnectionContext,
    ) -> Result<(), WriteErrorKind> {
        let just_started = self.slots[index].state == SlotState::WriteStart;
        if just_started {
            self.start_message(index, proto)?;
        }

        // Element overhead: optional tag, slot index, fragment size.
        let kind_pos = if *elem_count > 0 {
            let pos = *at;
            *at += 1;
            Some(pos)
        } else {
            None
        };
        *at += proto.store_cross(&mut data[*at..], index as u64);
        let size_pos = *at;
        *at += proto.store_u16(&mut data[*at..], 0);

        {
            let slot = &mut self.slots[index];
            ctx.request_id = MessageId::new(index, slot.unique);
            if let Some(bundle) = slot.bundle.as_ref() {
                ctx.message_flags = bundle.flags;
                ctx.message_url = bundle.url.clone();
            }
        }

        let cap = (data.len() - *at).min(u16::MAX as usize);
        let mut written = {
            let slot = &mut self.slots[index];
            let serializer = slot
                .serializer
                .as_mut()
                .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?;
            serializer
                .run(&mut data[*at..*at + cap])
                .map_err(WriteErrorKind::Codec)?
        };
        // The header drained with room to spare: the body follows inside
        // this same fragment.
        let head_done = {
            let slot = &self.slots[index];
            slot.state == SlotState::WriteHead
                && slot.serializer.as_ref().is_some_and(|s| s.is_empty())
        };
        if head_done {
            self.advance_to_body(index, proto)?;
            let slot = &mut self.slots[index];
            let serializer = slot
                .serializer
                .as_mut()
                .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?;
            written += serializer
                .run(&mut data[*at + written..*at + cap])
                .map_err(WriteErrorKind::Codec)?;
        }
        proto.store_u16(&mut data[size_pos..], written as u16);
        *at += written;
        *elem_count += 1;

        let done = {
            let slot = &self.slots[index];
            slot.state == SlotState::WriteBody
                && slot.serializer.as_ref().is_some_and(|s| s.is_empty())
        };
        let mut kind = if just_started {
            PacketKind::NewMessage as u8
        } else if kind_pos.is_none() && self.last_packet_tail == Some(index) {
            PacketKind::ContinuedMessage as u8
        } else {
            PacketKind::OldMessage as u8
        };
        if done {
            kind |= END_MESSAGE_FLAG;
        }
        match kind_pos {
            Some(pos) => {
                proto.store_u8(&mut data[pos..], kind);
            }
            None => options.packet_kind = kind,
        }
        trace!(index, written, done, "fragment emitted");

        if done {
            *tail = None;
            self.complete_after_serialization(index, sender, ctx)?;
        } else {
            *tail = Some(index);
            if self.slots[index].state == SlotState::WriteBody {
                self.note_continuation(index, config);
            }
        }
        Ok(())
    }

    /// Emit one fragment of relayed, pre-serialized data.
    #[allow(clippy::too_many_arguments)]
    fn emit_relayed_fragment(
        &mut self,
        index: usize,
        data: &mut [u8],
        at: &mut usize,
        elem_count: &mut usize,
        tail: &mut Option<usize>,
        options: &mut PacketOptions,
        sender: &mut dyn Sender,
        config: &WriterConfig,
        proto: &dyn Protocol,
        ctx: &mut ConnectionContext,
    ) -> Result<(), WriteErrorKind> {
        let just_started = self.slots[index].state == SlotState::RelayedStart;
        if just_started {
            let slot = &mut self.slots[index];
            if let Some(bundle) = slot.bundle.as_mut() {
                bundle.flags.set(MessageFlags::STARTED_SEND);
            }
            slot.state = SlotState::RelayedHead;
            slot.relay_at = 0;
        }

        let kind_pos = if *elem_count > 0 {
            let pos = *at;
            *at += 1;
            Some(pos)
        } else {
            None
        };
        *at += proto.store_cross(&mut data[*at..], index as u64);
        let size_pos = *at;
        *at += proto.store_u16(&mut data[*at..], 0);

        let cap = (data.len() - *at).min(u16::MAX as usize);
        let (written, done, is_last) = {
            let slot = &mut self.slots[index];
            let Some(bundle) = slot.bundle.as_ref() else {
                return Err(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit));
            };
            let Payload::Relayed(relay) = &bundle.payload else {
                return Err(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit));
            };
            let source = match slot.state {
                SlotState::RelayedHead => &relay.head,
                _ => &relay.body,
            };
            let take = (source.len() - slot.relay_at).min(cap);
            data[*at..*at + take]
                .copy_from_slice(&source[slot.relay_at..slot.relay_at + take]);
            slot.relay_at += take;
            let exhausted = slot.relay_at == source.len();
            let mut done = false;
            if exhausted {
                if slot.state == SlotState::RelayedHead {
                    slot.state = SlotState::RelayedBody;
                    slot.relay_at = 0;
                } else {
                    done = true;
                }
            }
            (take, done, relay.is_last)
        };
        proto.store_u16(&mut data[size_pos..], written as u16);
        *at += written;
        *elem_count += 1;
        options.request_accept = true;

        let mut kind = if just_started {
            PacketKind::NewMessage as u8
        } else if kind_pos.is_none() && self.last_packet_tail == Some(index) {
            PacketKind::ContinuedMessage as u8
        } else {
            PacketKind::OldMessage as u8
        };
        if done && is_last {
            kind |= END_MESSAGE_FLAG;
        }
        match kind_pos {
            Some(pos) => {
                proto.store_u8(&mut data[pos..], kind);
            }
            None => options.packet_kind = kind,
        }
        trace!(index, written, done, "relayed fragment emitted");

        if done {
            *tail = None;
            self.complete_after_serialization(index, sender, ctx)?;
        } else {
            *tail = Some(index);
            self.note_continuation(index, config);
        }
        Ok(())
    }

    /// Acquire and reset a serializer, mark the send started and push the
    /// message header.
    fn start_message(
        &mut self,
        index: usize,
        proto: &dyn Protocol,
    ) -> Result<(), WriteErrorKind> {
        let mut serializer = match self.parked_serializer.take() {
            Some(serializer) => serializer,
            None => proto.create_serializer(),
        };
        proto.reset_serializer(&mut serializer);

        let slot = &mut self.slots[index];
        let bundle = slot
            .bundle
            .as_mut()
            .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?;
        bundle.flags.set(MessageFlags::STARTED_SEND);
        let header = bundle.header();
        trace!(index, url = %header.url, "message send starting");
        header.encode(&mut serializer).map_err(WriteErrorKind::Codec)?;
        slot.serializer = Some(serializer);
        slot.state = SlotState::WriteHead;
        Ok(())
    }

    /// Once the header is fully serialized, push the body keyed by the
    /// registered type index.
    fn advance_to_body(
        &mut self,
        index: usize,
        proto: &dyn Protocol,
    ) -> Result<(), WriteErrorKind> {
        let slot = &mut self.slots[index];
        if slot.state != SlotState::WriteHead {
            return Ok(());
        }
        let Some(serializer) = slot.serializer.as_mut() else {
            return Err(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit));
        };
        if !serializer.is_empty() {
            return Ok(());
        }
        let bundle = slot
            .bundle
            .as_ref()
            .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?;
        let message = bundle
            .message()
            .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?
            .clone();
        let type_index = if bundle.type_index != 0 {
            bundle.type_index
        } else {
            proto.type_index(&*message).map_err(WriteErrorKind::Codec)?
        };
        serializer
            .push_cross(type_index as u64)
            .map_err(WriteErrorKind::Codec)?;
        message
            .encode_body(serializer)
            .map_err(WriteErrorKind::Codec)?;
        slot.state = SlotState::WriteBody;
        Ok(())
    }

    /// The message's last fragment went out: drop it from the write list,
    /// settle the synchronous gate and either complete it or leave it
    /// holding its slot for the response.
    fn complete_after_serialization(
        &mut self,
        index: usize,
        sender: &mut dyn Sender,
        ctx: &mut ConnectionContext,
    ) -> Result<(), WriteErrorKind> {
        if let Some(serializer) = self.slots[index].serializer.take() {
            self.parked_serializer = Some(serializer);
        }
        self.write_list.erase(&mut self.slots, index);
        if self.current_synchronous == Some(index) {
            self.current_synchronous = None;
        }
        self.locate_next_write_message();

        let slot = &mut self.slots[index];
        slot.state = SlotState::Empty;
        slot.packet_count = 0;
        if let Some(bundle) = slot.bundle.as_mut() {
            bundle.flags.reset(MessageFlags::STARTED_SEND);
            bundle.flags.set(MessageFlags::DONE_SEND);
        }

        if slot.waits_response() {
            // The slot stays on the order list; a response addressed by
            // (index, unique) claims it later.
            debug!(index, "message sent, awaiting response");
            return Ok(());
        }

        let bundle = slot
            .bundle
            .take()
            .ok_or(WriteErrorKind::Codec(muxrpc_codec::CodecError::Reinit))?;
        let pool_id = slot.pool_id;
        self.order_list.erase(&mut self.slots, index);
        self.release_slot(index);
        debug!(index, "message sent and completed");
        sender
            .complete_message(ctx, bundle, pool_id)
            .map_err(WriteErrorKind::Complete)
    }

    /// The message still has bytes pending after this packet; account the
    /// consecutive-packet run and rotate once the fairness cap is hit.
    fn note_continuation(&mut self, index: usize, config: &WriterConfig) {
        self.slots[index].packet_count += 1;
        if self.slots[index].packet_count < config.max_message_continuous_packet_count {
            return;
        }
        if self.slots[index].is_synchronous() {
            self.current_synchronous = Some(index);
        }
        self.slots[index].packet_count = 0;
        self.rotate_front();
        self.locate_next_write_message();
    }

    fn rotate_front(&mut self) {
        if let Some(front) = self.write_list.pop_front(&mut self.slots) {
            self.write_list.push_back(&mut self.slots, front);
        }
    }

    /// While a synchronous message is mid-flight, rotate every other
    /// synchronous message behind it so the front is either asynchronous or
    /// the current one.
    fn locate_next_write_message(&mut self) {
        let Some(current) = self.current_synchronous else {
            return;
        };
        while let Some(front) = self.write_list.front() {
            if front == current || !self.slots[front].is_synchronous() {
                trace!(front, "scheduling stops here");
                break;
            }
            trace!(front, "synchronous message rotated back");
            self.rotate_front();
        }
    }
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MessageWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageWriter")
            .field("order", &self.order_list.indices(&self.slots))
            .field("write", &self.write_list.indices(&self.slots))
            .field("cache", &self.cache_list.len())
            .field("current_synchronous", &self.current_synchronous)
            .finish()
    }
}
