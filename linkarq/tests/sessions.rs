//! End-to-end transfer sessions over an in-memory link.

use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use linkarq::bits::BitBuf;
use linkarq::channel::LossyChannel;
use linkarq::config::{DEFAULT_RECEIVER_ADDRESS, DEFAULT_SENDER_ADDRESS};
use linkarq::frame::{Acknowledgment, AckFrame, DataFrame, SeqEncoding};
use linkarq::journal::Journal;
use linkarq::receiver::{
    GoBackNReceiver, SelectiveRepeatReceiver, StopAndWaitReceiver,
};
use linkarq::sender::{GoBackNSender, SelectiveRepeatSender, StopAndWaitSender};
use linkarq::source::ChunkSource;
use linkarq::transport::{self, memory_pair, Link, MemLink};
use linkarq::{Error, FcsScheme, Protocol, SessionConfig};

/// Three 8-bit chunks used by the Stop-and-Wait scenarios.
const THREE_CHUNKS: &str = "101010101111000000001111";

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn config(protocol: Protocol) -> SessionConfig {
    SessionConfig::for_protocol(protocol, FcsScheme::Crc32, 1)
        .with_timeout(Duration::from_millis(80))
        .with_backoff(Duration::from_millis(10))
}

fn source(input: &'static str) -> ChunkSource<Cursor<&'static str>> {
    ChunkSource::new(Cursor::new(input), 1).unwrap()
}

fn data_frame(seq: u8, payload: &str) -> DataFrame {
    DataFrame::new(
        DEFAULT_SENDER_ADDRESS,
        DEFAULT_RECEIVER_ADDRESS,
        seq,
        BitBuf::parse(payload).unwrap(),
        FcsScheme::Crc32,
    )
    .unwrap()
}

fn send_ack(link: &mut MemLink, ack: Acknowledgment) {
    transport::write_ack_frame(
        link,
        &AckFrame { src: DEFAULT_RECEIVER_ADDRESS, dst: DEFAULT_SENDER_ADDRESS, ack },
    )
    .unwrap();
}

#[test]
fn stop_and_wait_lossless_delivers_in_order() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            StopAndWaitReceiver::new(
                receiver_link,
                FcsScheme::Crc32,
                DEFAULT_RECEIVER_ADDRESS,
                sink,
            )
            .run()
        })
    };

    let stats = StopAndWaitSender::new(
        sender_link,
        source(THREE_CHUNKS),
        LossyChannel::lossless(),
        Journal::disabled(),
        config(Protocol::StopAndWait).with_timeout(Duration::from_secs(2)),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(sink.contents(), "0. 10101010\n1. 11110000\n2. 00001111\n");
    assert_eq!(summary.delivered, 3);
    assert_eq!(summary.payload_bytes, Some(1));
    assert_eq!(stats.sent, 3);
    assert_eq!(stats.resent, 0);
    assert_eq!(stats.acks, 3);
}

#[test]
fn stop_and_wait_with_loss_delivers_exactly_once() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            StopAndWaitReceiver::new(
                receiver_link,
                FcsScheme::Crc32,
                DEFAULT_RECEIVER_ADDRESS,
                sink,
            )
            .run()
        })
    };

    let stats = StopAndWaitSender::new(
        sender_link,
        source("10101010"),
        LossyChannel::seeded(0.5, 0.0, 9).unwrap(),
        Journal::disabled(),
        config(Protocol::StopAndWait),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(sink.contents(), "0. 10101010\n");
    assert_eq!(summary.delivered, 1);
    assert_eq!(stats.sent, 1);
    assert_eq!(stats.attempts(), 1 + stats.resent);
}

#[test]
fn stop_and_wait_retransmits_through_corruption() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            StopAndWaitReceiver::new(
                receiver_link,
                FcsScheme::Crc32,
                DEFAULT_RECEIVER_ADDRESS,
                sink,
            )
            .run()
        })
    };

    let stats = StopAndWaitSender::new(
        sender_link,
        source(THREE_CHUNKS),
        LossyChannel::seeded(0.2, 0.4, 21).unwrap(),
        Journal::disabled(),
        SessionConfig::for_protocol(Protocol::StopAndWait, FcsScheme::Crc32, 1)
            .with_timeout(Duration::from_millis(60))
            .with_backoff(Duration::from_millis(10)),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(sink.contents(), "0. 10101010\n1. 11110000\n2. 00001111\n");
    assert_eq!(summary.delivered, 3);
    assert_eq!(stats.sent, 3);
}

#[test]
fn go_back_n_lossless_uses_no_retransmissions() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            GoBackNReceiver::new(receiver_link, FcsScheme::Crc32, DEFAULT_RECEIVER_ADDRESS, sink)
                .run()
        })
    };

    let input = "1010101011110000000011110011001111001100";
    let stats = GoBackNSender::new(
        sender_link,
        source(input),
        LossyChannel::lossless(),
        Journal::disabled(),
        config(Protocol::GoBackN)
            .with_window(3)
            .with_timeout(Duration::from_secs(2)),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(
        sink.contents(),
        "0. 10101010\n1. 11110000\n2. 00001111\n3. 00110011\n4. 11001100\n"
    );
    assert_eq!(summary.delivered, 5);
    assert_eq!(stats.sent, 5);
    assert_eq!(stats.resent, 0);
    assert_eq!(stats.acks, 5);
}

#[test]
fn go_back_n_recovers_from_loss_and_corruption() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            GoBackNReceiver::new(receiver_link, FcsScheme::Crc32, DEFAULT_RECEIVER_ADDRESS, sink)
                .run()
        })
    };

    let input = "1010101011110000000011110011001111001100";
    let stats = GoBackNSender::new(
        sender_link,
        source(input),
        LossyChannel::seeded(0.3, 0.3, 5).unwrap(),
        Journal::disabled(),
        config(Protocol::GoBackN).with_window(3),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(
        sink.contents(),
        "0. 10101010\n1. 11110000\n2. 00001111\n3. 00110011\n4. 11001100\n"
    );
    assert_eq!(summary.delivered, 5);
    assert_eq!(stats.sent, 5);
}

#[test]
fn go_back_n_retransmits_the_whole_window_on_timeout() {
    let (sender_link, mut peer) = memory_pair();

    let sender = thread::spawn(move || {
        GoBackNSender::new(
            sender_link,
            source(THREE_CHUNKS),
            LossyChannel::lossless(),
            Journal::disabled(),
            config(Protocol::GoBackN).with_window(3),
        )
        .run()
    });

    // First transmission of the full window, unacknowledged.
    let mut seqs = Vec::new();
    for _ in 0..3 {
        seqs.push(transport::read_data_frame(&mut peer).unwrap().seq_no);
    }
    // The timer fires and the whole window comes again.
    for _ in 0..3 {
        seqs.push(transport::read_data_frame(&mut peer).unwrap().seq_no);
    }
    assert_eq!(seqs, vec![0, 1, 2, 0, 1, 2]);

    // One cumulative ack retires everything.
    send_ack(&mut peer, Acknowledgment::Positive(2));
    while transport::read_data_frame(&mut peer).is_ok() {}
    let _ = peer.shutdown();

    let stats = sender.join().unwrap().unwrap();
    assert_eq!(stats.sent, 3);
    assert!(stats.resent >= 3);
    assert_eq!(stats.acks, 1);
}

#[test]
fn go_back_n_receiver_drops_corrupted_and_reacks() {
    let (mut peer, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let mut corrupted = data_frame(1, "11110000");
    corrupted.payload.flip(2);

    for frame in [
        data_frame(0, "10101010"),
        corrupted,
        data_frame(1, "11110000"),
        data_frame(2, "00001111"),
    ] {
        transport::write_data_frame(&mut peer, &frame).unwrap();
    }
    peer.shutdown().unwrap();

    let summary = GoBackNReceiver::new(
        receiver_link,
        FcsScheme::Crc32,
        DEFAULT_RECEIVER_ADDRESS,
        sink.clone(),
    )
    .run()
    .unwrap();

    assert_eq!(sink.contents(), "0. 10101010\n1. 11110000\n2. 00001111\n");
    assert_eq!(summary.delivered, 3);

    let acks: Vec<_> = (0..4)
        .map(|_| transport::read_ack_frame(&mut peer, SeqEncoding::Unsigned).unwrap().ack)
        .collect();
    assert_eq!(
        acks,
        vec![
            Acknowledgment::Positive(0),
            // Duplicate cumulative ack answering the corrupted frame.
            Acknowledgment::Positive(0),
            Acknowledgment::Positive(1),
            Acknowledgment::Positive(2),
        ]
    );
}

#[test]
fn selective_repeat_lossless_transfer() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            SelectiveRepeatReceiver::new(
                receiver_link,
                FcsScheme::Checksum,
                DEFAULT_RECEIVER_ADDRESS,
                sink,
                4,
            )
            .run()
        })
    };

    let input = "10101010111100000000111100110011";
    let stats = SelectiveRepeatSender::new(
        sender_link,
        source(input),
        LossyChannel::lossless(),
        Journal::disabled(),
        SessionConfig::for_protocol(Protocol::SelectiveRepeat, FcsScheme::Checksum, 1)
            .with_window(4)
            .with_timeout(Duration::from_secs(2)),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(
        sink.contents(),
        "0. 10101010\n1. 11110000\n2. 00001111\n3. 00110011\n"
    );
    assert_eq!(summary.delivered, 4);
    assert_eq!(stats.sent, 4);
    assert_eq!(stats.resent, 0);
    assert_eq!(stats.nacks, 0);
}

#[test]
fn selective_repeat_receiver_reorders_out_of_order_arrivals() {
    let (mut peer, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    for (seq, payload) in [(0, "10101010"), (2, "00001111"), (3, "00110011"), (1, "11110000")] {
        transport::write_data_frame(&mut peer, &data_frame(seq, payload)).unwrap();
    }
    peer.shutdown().unwrap();

    let summary = SelectiveRepeatReceiver::new(
        receiver_link,
        FcsScheme::Crc32,
        DEFAULT_RECEIVER_ADDRESS,
        sink.clone(),
        4,
    )
    .run()
    .unwrap();

    // Frame 0 flushes immediately; 2 and 3 wait in the buffer until 1
    // fills the gap and the whole run flushes in order.
    assert_eq!(
        sink.contents(),
        "0. 10101010\n1. 11110000\n2. 00001111\n3. 00110011\n"
    );
    assert_eq!(summary.delivered, 4);

    let acks: Vec<_> = (0..4)
        .map(|_| transport::read_ack_frame(&mut peer, SeqEncoding::Signed).unwrap().ack)
        .collect();
    assert_eq!(
        acks,
        vec![
            Acknowledgment::Positive(0),
            // Each arrival above the gap chases the missing frame 1.
            Acknowledgment::Negative(1),
            Acknowledgment::Negative(1),
            Acknowledgment::Positive(1),
        ]
    );
}

#[test]
fn selective_repeat_sender_answers_nack_with_immediate_resend() {
    let (sender_link, mut peer) = memory_pair();

    let sender = thread::spawn(move || {
        SelectiveRepeatSender::new(
            sender_link,
            source("1010101011110000"),
            LossyChannel::lossless(),
            Journal::disabled(),
            config(Protocol::SelectiveRepeat)
                .with_window(2)
                .with_timeout(Duration::from_secs(5)),
        )
        .run()
    });

    let first = transport::read_data_frame(&mut peer).unwrap();
    let second = transport::read_data_frame(&mut peer).unwrap();
    assert_eq!((first.seq_no, second.seq_no), (0, 1));

    // A NACK for frame 0 must trigger a resend well before the 5 s
    // per-frame timeout.
    send_ack(&mut peer, Acknowledgment::Negative(0));
    let resent = transport::read_data_frame(&mut peer).unwrap();
    assert_eq!(resent.seq_no, 0);
    assert_eq!(resent.payload, first.payload);

    // The cumulative positive ack retires both outstanding frames.
    send_ack(&mut peer, Acknowledgment::Positive(1));
    while transport::read_data_frame(&mut peer).is_ok() {}
    let _ = peer.shutdown();

    let stats = sender.join().unwrap().unwrap();
    assert_eq!(stats.sent, 2);
    assert_eq!(stats.resent, 1);
    assert_eq!(stats.nacks, 1);
    assert_eq!(stats.acks, 1);
}

#[test]
fn selective_repeat_recovers_from_a_lossy_channel() {
    let (sender_link, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let receiver = {
        let sink = sink.clone();
        thread::spawn(move || {
            SelectiveRepeatReceiver::new(
                receiver_link,
                FcsScheme::Crc32,
                DEFAULT_RECEIVER_ADDRESS,
                sink,
                4,
            )
            .run()
        })
    };

    let input = "10101010111100000000111100110011";
    let stats = SelectiveRepeatSender::new(
        sender_link,
        source(input),
        LossyChannel::seeded(0.3, 0.3, 11).unwrap(),
        Journal::disabled(),
        SessionConfig::for_protocol(Protocol::SelectiveRepeat, FcsScheme::Crc32, 1)
            .with_window(4)
            .with_timeout(Duration::from_millis(80)),
    )
    .run()
    .unwrap();

    let summary = receiver.join().unwrap().unwrap();
    assert_eq!(
        sink.contents(),
        "0. 10101010\n1. 11110000\n2. 00001111\n3. 00110011\n"
    );
    assert_eq!(summary.delivered, 4);
    assert_eq!(stats.sent, 4);
}

#[test]
fn stop_and_wait_receiver_stays_silent_on_corruption() {
    let (mut peer, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let mut corrupted = data_frame(0, "10101010");
    corrupted.payload.flip(0);
    transport::write_data_frame(&mut peer, &corrupted).unwrap();
    transport::write_data_frame(&mut peer, &data_frame(0, "10101010")).unwrap();
    peer.shutdown().unwrap();

    let summary = StopAndWaitReceiver::new(
        receiver_link,
        FcsScheme::Crc32,
        DEFAULT_RECEIVER_ADDRESS,
        sink.clone(),
    )
    .run()
    .unwrap();

    assert_eq!(sink.contents(), "0. 10101010\n");
    assert_eq!(summary.delivered, 1);

    // Exactly one acknowledgement: the corrupted copy was dropped
    // without a word.
    assert!(transport::read_ack_frame(&mut peer, SeqEncoding::Unsigned).is_ok());
    assert!(transport::read_ack_frame(&mut peer, SeqEncoding::Unsigned).is_err());
}

#[test]
fn address_mismatch_ends_the_session() {
    let (mut peer, receiver_link) = memory_pair();
    let sink = SharedBuf::default();

    let stray = DataFrame::new(
        DEFAULT_SENDER_ADDRESS,
        DEFAULT_SENDER_ADDRESS,
        0,
        BitBuf::parse("10101010").unwrap(),
        FcsScheme::Crc32,
    )
    .unwrap();
    transport::write_data_frame(&mut peer, &stray).unwrap();
    peer.shutdown().unwrap();

    let outcome = GoBackNReceiver::new(
        receiver_link,
        FcsScheme::Crc32,
        DEFAULT_RECEIVER_ADDRESS,
        sink,
    )
    .run();
    assert!(matches!(outcome, Err(Error::AddressMismatch { .. })));
}
