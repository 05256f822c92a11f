//! aegis-header-crypto
//!
//! The per-direction header cipher used once a realm session has a session
//! key: an HMAC-SHA1-keyed, ARC4-drop1024-warmed RC4 stream that only ever
//! touches packet headers, never bodies. [`FrameCursor`] tracks how much of
//! a growing receive buffer has already had its header decrypted, so a
//! partial read followed by a second read never decrypts the same header
//! twice.

#![deny(missing_docs, unsafe_code)]

use hmac::{Hmac, Mac};
use rc4::{consts::U20, KeyInit, Rc4, StreamCipher};
use sha1::Sha1;

/// Inbound (client -> realm) headers are 4 bytes: a big-endian `u16` size
/// followed by a little-endian `u16` opcode.
pub const INBOUND_HEADER_LEN: usize = 4;
/// Outbound (realm -> client) headers are 5 bytes: a big-endian `u16` size
/// followed by a little-endian 3-byte opcode (opcodes above `0xFFFF` widen
/// into the extra byte; builds below that threshold leave it zero).
pub const OUTBOUND_HEADER_LEN: usize = 5;

const HMAC_KEY_LEN: usize = 16;
const DECRYPT_KEY: [u8; HMAC_KEY_LEN] = [
    0xC2, 0xB3, 0x72, 0x3C, 0xC6, 0xAE, 0xD9, 0xB5, 0x34, 0x3C, 0x53, 0xEE, 0x2F, 0x43, 0x67, 0xCE,
];
const ENCRYPT_KEY: [u8; HMAC_KEY_LEN] = [
    0xCC, 0x98, 0xAE, 0x04, 0xE8, 0x97, 0xEA, 0xCA, 0x12, 0xDD, 0xC0, 0x93, 0x42, 0x91, 0x53, 0x57,
];

type HmacSha1 = Hmac<Sha1>;

/// The cipher state for headers leaving this side of the connection. The
/// stream is never reset; state advances with every header processed for
/// the lifetime of the session.
pub struct SendHeaderCipher {
    stream: Rc4<U20>,
}

impl SendHeaderCipher {
    /// Encrypts an outbound header in place.
    pub fn encrypt(&mut self, header: &mut [u8; OUTBOUND_HEADER_LEN]) {
        self.stream.apply_keystream(header);
    }
}

impl std::fmt::Debug for SendHeaderCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendHeaderCipher").finish_non_exhaustive()
    }
}

/// The cipher state for headers arriving on this side of the connection.
pub struct RecvHeaderCipher {
    stream: Rc4<U20>,
}

impl RecvHeaderCipher {
    /// Decrypts an inbound header in place.
    pub fn decrypt(&mut self, header: &mut [u8; INBOUND_HEADER_LEN]) {
        self.stream.apply_keystream(header);
    }
}

impl std::fmt::Debug for RecvHeaderCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecvHeaderCipher").finish_non_exhaustive()
    }
}

/// Holds the two independent RC4 streams for a session: one for headers
/// leaving this side, one for headers arriving. [`HeaderCrypto::into_split`]
/// separates them so a connection's reading and writing halves can run as
/// independent tasks without sharing a lock.
pub struct HeaderCrypto {
    send: SendHeaderCipher,
    recv: RecvHeaderCipher,
}

impl std::fmt::Debug for HeaderCrypto {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderCrypto").finish_non_exhaustive()
    }
}

impl HeaderCrypto {
    /// Derives both RC4 streams from the 40-byte session key and warms
    /// each with ARC4-drop1024 (discards the first 1024 keystream bytes,
    /// the part of the RC4 stream that is weakest).
    pub fn new(session_key: &[u8; 40]) -> Self {
        let send_key = hmac_key(&ENCRYPT_KEY, session_key);
        let recv_key = hmac_key(&DECRYPT_KEY, session_key);

        let mut send = Rc4::new(&send_key.into());
        let mut recv = Rc4::new(&recv_key.into());

        let mut drop_buf = [0u8; 1024];
        send.apply_keystream(&mut drop_buf);
        drop_buf = [0u8; 1024];
        recv.apply_keystream(&mut drop_buf);

        Self {
            send: SendHeaderCipher { stream: send },
            recv: RecvHeaderCipher { stream: recv },
        }
    }

    /// Encrypts an outbound header in place.
    pub fn encrypt_send(&mut self, header: &mut [u8; OUTBOUND_HEADER_LEN]) {
        self.send.encrypt(header);
    }

    /// Decrypts an inbound header in place.
    pub fn decrypt_recv(&mut self, header: &mut [u8; INBOUND_HEADER_LEN]) {
        self.recv.decrypt(header);
    }

    /// Splits the session cipher into its two direction halves.
    pub fn into_split(self) -> (SendHeaderCipher, RecvHeaderCipher) {
        (self.send, self.recv)
    }
}

fn hmac_key(key: &[u8; HMAC_KEY_LEN], session_key: &[u8; 40]) -> [u8; 20] {
    let mut mac = HmacSha1::new_from_slice(key).expect("hmac accepts keys of any length");
    mac.update(session_key);
    mac.finalize().into_bytes().into()
}

/// Tracks how far into a connection's receive buffer the inbound header
/// cipher has already been applied, so re-entering the parse loop on a
/// partial read never decrypts the same header bytes twice.
#[derive(Debug, Default)]
pub struct FrameCursor {
    decrypted_until: usize,
}

impl FrameCursor {
    /// A fresh cursor for a new connection, or for the state right after a
    /// full packet has been consumed from the buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// If the header at `parsed_until` hasn't been decrypted yet and the
    /// buffer holds at least [`INBOUND_HEADER_LEN`] bytes from that point,
    /// decrypts it in place and records the new high-water mark. Returns
    /// whether a header was decrypted (`false` means not enough bytes have
    /// arrived yet, or this header was already handled).
    pub fn decrypt_header(
        &mut self,
        cipher: &mut RecvHeaderCipher,
        buf: &mut [u8],
        parsed_until: usize,
    ) -> bool {
        if self.decrypted_until > parsed_until {
            return false;
        }
        if buf.len() - parsed_until < INBOUND_HEADER_LEN {
            return false;
        }

        let header: &mut [u8; INBOUND_HEADER_LEN] = buf
            [parsed_until..parsed_until + INBOUND_HEADER_LEN]
            .try_into()
            .expect("checked above");
        cipher.decrypt(header);
        self.decrypted_until = parsed_until + INBOUND_HEADER_LEN;
        true
    }

    /// Called once a full packet has been consumed from the buffer and the
    /// buffer has been compacted: the next header in the (now shifted)
    /// buffer has never been decrypted.
    pub fn reset(&mut self) {
        self.decrypted_until = 0;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn session_key() -> [u8; 40] {
        let mut k = [0u8; 40];
        for (i, b) in k.iter_mut().enumerate() {
            *b = i as u8;
        }
        k
    }

    #[test]
    fn encrypt_then_decrypt_is_not_the_identity_across_directions() {
        let mut server = HeaderCrypto::new(&session_key());
        let mut original = [1, 2, 3, 4, 5];
        let mut header = original;
        server.encrypt_send(&mut header);
        assert_ne!(header, original);

        // decrypting with the same stream state as encryption (not the
        // opposite keyed stream) does not recover the plaintext: send and
        // recv are independent streams, by design.
        original = header;
        let mut as_if_inbound = [header[0], header[1], header[2], header[3]];
        server.decrypt_recv(&mut as_if_inbound);
        assert_ne!(as_if_inbound, [original[0], original[1], original[2], original[3]]);
    }

    #[test]
    fn send_and_recv_streams_advance_independently() {
        let mut a = HeaderCrypto::new(&session_key());
        let mut b = HeaderCrypto::new(&session_key());

        let mut h1 = [0u8; OUTBOUND_HEADER_LEN];
        let mut h2 = [0u8; OUTBOUND_HEADER_LEN];
        a.encrypt_send(&mut h1);
        a.encrypt_send(&mut h2);
        assert_ne!(h1, h2, "stream position must advance between calls");

        let mut h1_fresh = [0u8; OUTBOUND_HEADER_LEN];
        b.encrypt_send(&mut h1_fresh);
        assert_eq!(h1, h1_fresh, "same key must produce the same keystream");
    }

    #[test]
    fn split_halves_continue_the_same_streams() {
        let mut whole = HeaderCrypto::new(&session_key());
        let (mut send, mut recv) = HeaderCrypto::new(&session_key()).into_split();

        let mut h_whole = [9u8; OUTBOUND_HEADER_LEN];
        let mut h_split = [9u8; OUTBOUND_HEADER_LEN];
        whole.encrypt_send(&mut h_whole);
        send.encrypt(&mut h_split);
        assert_eq!(h_whole, h_split);

        let mut i_whole = [7u8; INBOUND_HEADER_LEN];
        let mut i_split = [7u8; INBOUND_HEADER_LEN];
        whole.decrypt_recv(&mut i_whole);
        recv.decrypt(&mut i_split);
        assert_eq!(i_whole, i_split);
    }

    #[test]
    fn frame_cursor_never_decrypts_the_same_header_twice() {
        let (_, mut cipher) = HeaderCrypto::new(&session_key()).into_split();
        let mut cursor = FrameCursor::new();

        let mut buf = vec![0u8; INBOUND_HEADER_LEN];
        assert!(cursor.decrypt_header(&mut cipher, &mut buf, 0));
        let after_first = buf.clone();

        // a second read arrives but the header bytes are still the same
        // slice at the same offset (simulating "partial read, parse again")
        assert!(!cursor.decrypt_header(&mut cipher, &mut buf, 0));
        assert_eq!(buf, after_first, "must not decrypt twice");

        cursor.reset();
        assert!(cursor.decrypt_header(&mut cipher, &mut buf, 0));
        assert_ne!(buf, after_first, "a third pass re-applies the keystream");
    }

    #[test]
    fn frame_cursor_waits_for_a_complete_header() {
        let (_, mut cipher) = HeaderCrypto::new(&session_key()).into_split();
        let mut cursor = FrameCursor::new();
        let mut short = vec![0u8; INBOUND_HEADER_LEN - 1];
        assert!(!cursor.decrypt_header(&mut cipher, &mut short, 0));
    }
}
