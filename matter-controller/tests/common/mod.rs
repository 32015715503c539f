/*
 *
 *    Copyright (c) 2020-2022 Project CHIP Authors
 *
 *    Licensed under the Apache License, Version 2.0 (the "License");
 *    you may not use this file except in compliance with the License.
 *    You may obtain a copy of the License at
 *
 *        http://www.apache.org/licenses/LICENSE-2.0
 *
 *    Unless required by applicable law or agreed to in writing, software
 *    distributed under the License is distributed on an "AS IS" BASIS,
 *    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *    See the License for the specific language governing permissions and
 *    limitations under the License.
 */

//! Shared test fixtures: an in-memory exchange pair, deterministic crypto
//! and an in-memory fabric/session store for the CASE responder.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use elliptic_curve::sec1::ToEncodedPoint;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::ProjectivePoint;

use matter_controller::crypto::{default_crypto, Crypto, DefaultCrypto, SIGNATURE_LEN};
use matter_controller::error::{Error, ErrorCode};
use matter_controller::fabric::{compute_destination_id, CaseContext, Fabric, IPK_LEN};
use matter_controller::tlv::{get_root_node_struct, TLVWriter, TagType};
use matter_controller::transport::exchange::{Exchange, ExchangeProvider, RxMessage};
use matter_controller::transport::session::{ResumptionRecord, SecureSession};
use matter_controller::utils::storage::WriteBuf;

pub type TestCrypto = DefaultCrypto<StdRng>;

pub fn seeded_crypto(seed: u64) -> TestCrypto {
    default_crypto(StdRng::seed_from_u64(seed))
}

/// One end of an in-memory duplex exchange.
pub struct TestExchange {
    tx: async_channel::Sender<(u8, Vec<u8>)>,
    rx: async_channel::Receiver<(u8, Vec<u8>)>,
    session_id: u16,
    closed: bool,
    sent_log: Rc<RefCell<Vec<u8>>>,
}

impl TestExchange {
    /// The opcodes this end has sent so far
    pub fn sent_log(&self) -> Rc<RefCell<Vec<u8>>> {
        Rc::clone(&self.sent_log)
    }
}

impl Exchange for TestExchange {
    async fn send(&mut self, proto_opcode: u8, payload: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(ErrorCode::TxFailure.into());
        }
        self.sent_log.borrow_mut().push(proto_opcode);
        self.tx
            .send((proto_opcode, payload.to_vec()))
            .await
            .map_err(|_| ErrorCode::TxFailure.into())
    }

    async fn recv(&mut self) -> Result<RxMessage, Error> {
        let (proto_opcode, payload) = self
            .rx
            .recv()
            .await
            .map_err(|_| ErrorCode::RxTimeout)?;
        Ok(RxMessage {
            proto_opcode,
            payload,
        })
    }

    fn session_id(&self) -> u16 {
        self.session_id
    }

    fn close(&mut self) {
        self.closed = true;
        self.tx.close();
    }
}

/// Create a connected pair of exchanges sharing a session id.
pub fn exchange_pair(session_id: u16) -> (TestExchange, TestExchange) {
    let (a_tx, b_rx) = async_channel::unbounded();
    let (b_tx, a_rx) = async_channel::unbounded();

    (
        TestExchange {
            tx: a_tx,
            rx: a_rx,
            session_id,
            closed: false,
            sent_log: Rc::new(RefCell::new(Vec::new())),
        },
        TestExchange {
            tx: b_tx,
            rx: b_rx,
            session_id,
            closed: false,
            sent_log: Rc::new(RefCell::new(Vec::new())),
        },
    )
}

/// An exchange provider handing out pre-created exchanges in order.
pub struct QueueProvider {
    exchanges: RefCell<VecDeque<TestExchange>>,
}

impl QueueProvider {
    pub fn new(exchanges: Vec<TestExchange>) -> Self {
        Self {
            exchanges: RefCell::new(exchanges.into()),
        }
    }
}

impl ExchangeProvider for QueueProvider {
    type Exchange = TestExchange;

    async fn initiate(&self) -> Result<TestExchange, Error> {
        self.exchanges
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| ErrorCode::TxFailure.into())
    }
}

/// Encode a value as anonymous-tagged TLV bytes.
pub fn encode_with(f: impl FnOnce(&mut TLVWriter) -> Result<(), Error>) -> Vec<u8> {
    let mut buf = [0u8; 256];
    let mut wb = WriteBuf::new(&mut buf);
    {
        let mut tw = TLVWriter::new(&mut wb);
        f(&mut tw).unwrap();
    }
    wb.as_slice().to_vec()
}

pub fn encode_bool(v: bool) -> Vec<u8> {
    encode_with(|tw| tw.bool(&TagType::Anonymous, v))
}

pub fn encode_u8(v: u8) -> Vec<u8> {
    encode_with(|tw| tw.u8(&TagType::Anonymous, v))
}

/// A test operational identity: a node id plus a fresh P-256 key pair, with
/// the "certificate" encoded as `{1: nodeId, 2: publicKey}` TLV.
pub struct TestIdentity {
    pub node_id: u64,
    pub noc: Vec<u8>,
    pub key: SigningKey,
}

impl TestIdentity {
    pub fn new(node_id: u64, seed: u64) -> Self {
        let key = SigningKey::random(&mut StdRng::seed_from_u64(seed));
        let public_key = key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        let noc = encode_with(|tw| {
            tw.start_struct(&TagType::Anonymous)?;
            tw.u64(&TagType::Context(1), node_id)?;
            tw.octets(&TagType::Context(2), &public_key)?;
            tw.end_container()
        });

        Self { node_id, noc, key }
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        let signature: Signature = self.key.sign(message);
        let mut out = [0u8; SIGNATURE_LEN];
        out.copy_from_slice(&signature.to_bytes());
        out
    }
}

pub fn parse_test_noc(noc: &[u8]) -> Result<(u64, Vec<u8>), Error> {
    let root = get_root_node_struct(noc)?;
    Ok((
        root.ctx(1)?.u64()?,
        root.ctx(2)?.octet_str()?.to_vec(),
    ))
}

/// The responder-side fabric for CASE tests.
pub struct TestFabric {
    pub index: u8,
    pub fabric_id: u64,
    pub ipk: [u8; IPK_LEN],
    pub root_public_key: Vec<u8>,
    pub identity: TestIdentity,
}

impl TestFabric {
    pub fn new(index: u8, fabric_id: u64, node_id: u64) -> Self {
        let identity = TestIdentity::new(node_id, 0x1000 + node_id);
        // The trust root is only matched by bytes in these tests
        let root_key = SigningKey::random(&mut StdRng::seed_from_u64(x_root_seed()));
        let root_public_key = root_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        Self {
            index,
            fabric_id,
            ipk: [0x42; IPK_LEN],
            root_public_key,
            identity,
        }
    }
}

fn x_root_seed() -> u64 {
    0x726f_6f74
}

impl Fabric for TestFabric {
    fn index(&self) -> u8 {
        self.index
    }

    fn node_id(&self) -> u64 {
        self.identity.node_id
    }

    fn noc(&self) -> &[u8] {
        &self.identity.noc
    }

    fn icac(&self) -> Option<&[u8]> {
        None
    }

    fn ipk(&self) -> &[u8; IPK_LEN] {
        &self.ipk
    }

    fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_LEN], Error> {
        Ok(self.identity.sign(message))
    }

    fn verify_credentials(&self, noc: &[u8], _icac: Option<&[u8]>) -> Result<(), Error> {
        parse_test_noc(noc).map(|_| ())
    }

    fn public_key_from_noc(&self, noc: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(parse_test_noc(noc)?.1)
    }

    fn node_id_from_noc(&self, noc: &[u8]) -> Result<u64, Error> {
        Ok(parse_test_noc(noc)?.0)
    }
}

/// An in-memory session and resumption-record store.
pub struct TestCaseContext {
    pub fabric: TestFabric,
    crypto: TestCrypto,
    next_session_id: Cell<u16>,
    pub sessions: RefCell<Vec<SecureSession>>,
    pub records: RefCell<HashMap<[u8; 16], ResumptionRecord>>,
}

impl TestCaseContext {
    pub fn new(fabric: TestFabric) -> Self {
        Self {
            fabric,
            crypto: seeded_crypto(0xc0),
            next_session_id: Cell::new(100),
            sessions: RefCell::new(Vec::new()),
            records: RefCell::new(HashMap::new()),
        }
    }
}

impl CaseContext for TestCaseContext {
    type Fabric = TestFabric;

    fn next_session_id(&self) -> u16 {
        let id = self.next_session_id.get();
        self.next_session_id.set(id + 1);
        id
    }

    fn find_fabric_from_destination_id(
        &self,
        destination_id: &[u8],
        initiator_random: &[u8],
    ) -> Option<&Self::Fabric> {
        let expected = compute_destination_id(
            &self.crypto,
            &self.fabric.ipk,
            initiator_random,
            &self.fabric.root_public_key,
            self.fabric.fabric_id,
            self.fabric.identity.node_id,
        )
        .ok()?;

        (destination_id == expected).then_some(&self.fabric)
    }

    fn find_resumption_record(&self, resumption_id: &[u8; 16]) -> Option<ResumptionRecord> {
        self.records.borrow().get(resumption_id).cloned()
    }

    fn save_resumption_record(&self, record: ResumptionRecord) {
        let mut records = self.records.borrow_mut();
        // A rotation replaces the record of the same peer
        records.retain(|_, r| r.peer_node_id != record.peer_node_id);
        records.insert(record.resumption_id, record);
    }

    fn create_session(&self, session: SecureSession) {
        self.sessions.borrow_mut().push(session);
    }

    fn remove_session(&self, local_session_id: u16) {
        self.sessions
            .borrow_mut()
            .retain(|s| s.local_session_id != local_session_id);
    }
}

/// An initiator-side ephemeral ECDH pair for CASE tests.
pub struct EphemeralKey {
    secret: p256::NonZeroScalar,
    pub public_key: Vec<u8>,
}

impl EphemeralKey {
    pub fn new(seed: u64) -> Self {
        let secret = p256::NonZeroScalar::random(&mut StdRng::seed_from_u64(seed));
        let public_key = (ProjectivePoint::GENERATOR * *secret)
            .to_affine()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();
        Self { secret, public_key }
    }

    pub fn shared_secret(&self, peer_public_key: &[u8]) -> [u8; 32] {
        let peer = p256::PublicKey::from_sec1_bytes(peer_public_key).unwrap();
        let point = (peer.to_projective() * *self.secret)
            .to_affine()
            .to_encoded_point(false);
        let mut out = [0u8; 32];
        out.copy_from_slice(point.x().unwrap());
        out
    }
}

/// HKDF convenience for test-side key derivation.
pub fn hkdf16(crypto: &TestCrypto, ikm: &[u8], salt: &[u8], info: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    crypto.hkdf_sha256(ikm, salt, info, &mut out).unwrap();
    out
}
