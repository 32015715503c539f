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

//! Interaction client scenarios against a scripted peer exchange.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use embassy_futures::join::join;
use futures_lite::future::block_on;

use matter_controller::dm::{on_off, Command, NoResponse, TlvCodec};
use matter_controller::error::{Error, ErrorCode};
use matter_controller::im::{
    AttrPath, AttrReport, AttrStatus, CmdData, CmdPath, CmdStatus, IMStatusCode, ImMessenger,
    InteractionClient, InvokeReqMsg, InvokeRespMsg, InvokeResult, OpCode, ReadReqMsg,
    ReportDataMsg, Status, StatusRespMsg, SubscribeReqMsg, SubscribeRespMsg, SubscriptionManager,
    SubscriptionReceiver, WriteReqMsg, WriteRespMsg,
};
use matter_controller::tlv::{get_root_node_struct, FromTLV, TLVElement};

use common::{encode_bool, encode_u8, exchange_pair, QueueProvider, TestExchange};

const ENDPOINT: u16 = 1;
const ON_OFF_CLUSTER: u32 = 0x0006;
const ON_OFF_ATTR: u32 = 0x0000;

fn u8_report(attr: u32, value: u8) -> AttrReport {
    AttrReport::data(
        AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, attr),
        encode_u8(value),
        value as u32,
    )
}

fn u8_of(report: &AttrReport) -> u8 {
    u8::decode(&TLVElement::new(report.value.as_ref().unwrap())).unwrap()
}

// S5: chunked wildcard read
#[test]
fn wildcard_read_reassembles_chunks_in_order() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            let payload = messenger.read(OpCode::ReadRequest).await?;
            let req = ReadReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(req.attr_requests, vec![AttrPath::WILDCARD]);
            assert!(req.fabric_filtered);

            let chunks = [
                (vec![u8_report(0x10, 1), u8_report(0x11, 2)], true, false),
                (vec![u8_report(0x12, 3)], true, false),
                (vec![u8_report(0x13, 4), u8_report(0x14, 5)], false, true),
            ];

            let mut statuses = 0usize;
            for (attr_reports, more_chunks, suppress_response) in chunks {
                messenger
                    .send(
                        OpCode::ReportData,
                        &ReportDataMsg {
                            subscription_id: None,
                            attr_reports,
                            more_chunks,
                            suppress_response,
                        },
                    )
                    .await?;

                if !suppress_response {
                    let payload = messenger.read(OpCode::StatusResponse).await?;
                    let status = StatusRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;
                    assert_eq!(status.status, IMStatusCode::Success);
                    statuses += 1;
                }
            }
            Ok::<_, Error>(statuses)
        };

        let (reports, statuses) = join(client.get_all_attributes(), peer).await;

        // Exactly the two interim acknowledgements; the suppressed final
        // chunk gets none
        assert_eq!(statuses.unwrap(), 2);

        let reports = reports.unwrap();
        let values: Vec<u8> = reports.iter().map(u8_of).collect();
        assert_eq!(values, [1, 2, 3, 4, 5]);
    });
}

// S6: subscribe round trip with cache read-through
#[test]
fn subscribe_updates_cache_and_listener() {
    block_on(async {
        let session_id = 1;
        let (client_end, peer_end) = exchange_pair(session_id);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let observed: Rc<RefCell<Vec<(bool, u32)>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&observed);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            let payload = messenger.read(OpCode::SubscribeRequest).await?;
            let req = SubscribeReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert!(req.keep_subscriptions);
            assert!(req.fabric_filtered);
            assert_eq!(
                req.attr_requests,
                vec![AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR)]
            );
            assert_eq!(req.max_interval_ceiling, 60);

            // Primed report, then the subscribe response
            messenger
                .send(
                    OpCode::ReportData,
                    &ReportDataMsg {
                        subscription_id: Some(33),
                        attr_reports: vec![AttrReport::data(
                            AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR),
                            encode_bool(false),
                            7,
                        )],
                        more_chunks: false,
                        suppress_response: false,
                    },
                )
                .await?;
            messenger.read(OpCode::StatusResponse).await?;
            messenger
                .send(
                    OpCode::SubscribeResponse,
                    &SubscribeRespMsg {
                        subscription_id: 33,
                        max_interval: 60,
                    },
                )
                .await?;
            Ok::<_, Error>(())
        };

        let (subscription_id, peer_result) = join(
            client.subscribe(
                ENDPOINT,
                ON_OFF_CLUSTER,
                &on_off::ON_OFF,
                0,
                60,
                move |value, version| sink.borrow_mut().push((value, version)),
            ),
            peer,
        )
        .await;

        peer_result.unwrap();
        assert_eq!(subscription_id.unwrap(), 33);

        // The primed report went through the listener synchronously
        assert_eq!(observed.borrow().as_slice(), &[(false, 7)]);

        // get() is served from the cache: the provider has no exchanges
        // left, so any network attempt would fail
        let value = client.get(ENDPOINT, ON_OFF_CLUSTER, &on_off::ON_OFF).await.unwrap();
        assert!(!value);

        // A server-initiated report through the shared receiver updates both
        // the cache and the listener
        let (inbound_end, report_peer_end) = exchange_pair(session_id);
        let receiver = SubscriptionReceiver::new(&manager);

        let peer = async {
            let mut messenger = ImMessenger::new(report_peer_end);
            messenger
                .send(
                    OpCode::ReportData,
                    &ReportDataMsg {
                        subscription_id: Some(33),
                        attr_reports: vec![AttrReport::data(
                            AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR),
                            encode_bool(true),
                            9,
                        )],
                        more_chunks: false,
                        suppress_response: false,
                    },
                )
                .await?;
            let payload = messenger.read(OpCode::StatusResponse).await?;
            let status = StatusRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(status.status, IMStatusCode::Success);
            Ok::<_, Error>(())
        };

        let (handled, peer_result) = join(receiver.handle(inbound_end), peer).await;
        handled.unwrap();
        peer_result.unwrap();

        assert_eq!(observed.borrow().as_slice(), &[(false, 7), (true, 9)]);
        let value = client.get(ENDPOINT, ON_OFF_CLUSTER, &on_off::ON_OFF).await.unwrap();
        assert!(value);
    });
}

#[test]
fn report_for_unknown_subscription_is_rejected() {
    block_on(async {
        let manager = SubscriptionManager::new();
        let receiver = SubscriptionReceiver::new(&manager);
        let (inbound_end, peer_end) = exchange_pair(1);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            messenger
                .send(
                    OpCode::ReportData,
                    &ReportDataMsg {
                        subscription_id: Some(99),
                        attr_reports: vec![],
                        more_chunks: false,
                        suppress_response: false,
                    },
                )
                .await?;
            let payload = messenger.read(OpCode::StatusResponse).await?;
            let status = StatusRespMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            Ok::<_, Error>(status.status)
        };

        let (handled, peer_status) = join(receiver.handle(inbound_end), peer).await;

        assert_eq!(
            handled.unwrap_err().code(),
            ErrorCode::InvalidSubscription
        );
        assert_eq!(peer_status.unwrap(), IMStatusCode::InvalidSubscription);
    });
}

// Invariant 6: writes never populate the cache
#[test]
fn set_does_not_touch_the_cache() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            let payload = messenger.read(OpCode::WriteRequest).await?;
            let req = WriteReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(req.write_requests.len(), 1);
            assert!(!req.suppress_response);
            assert!(!req.timed_request);

            messenger
                .send(
                    OpCode::WriteResponse,
                    &WriteRespMsg {
                        write_responses: vec![AttrStatus {
                            path: req.write_requests[0].path,
                            status: Status::new(IMStatusCode::Success),
                        }],
                    },
                )
                .await?;
            Ok::<_, Error>(())
        };

        let (result, peer_result) = join(
            client.set(ENDPOINT, ON_OFF_CLUSTER, &on_off::ON_OFF, &true, None),
            peer,
        )
        .await;

        peer_result.unwrap();
        result.unwrap();

        assert!(client.cached(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR).is_none());
    });
}

// Invariant 7: only non-success write results come back
#[test]
fn set_multiple_returns_only_failures() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let good = AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR);
        let bad = AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x4001);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            let payload = messenger.read(OpCode::WriteRequest).await?;
            let req = WriteReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(req.write_requests.len(), 2);

            messenger
                .send(
                    OpCode::WriteResponse,
                    &WriteRespMsg {
                        write_responses: vec![
                            AttrStatus {
                                path: good,
                                status: Status::new(IMStatusCode::Success),
                            },
                            AttrStatus {
                                path: bad,
                                status: Status::new(IMStatusCode::UnsupportedWrite),
                            },
                        ],
                    },
                )
                .await?;
            Ok::<_, Error>(())
        };

        let items = vec![
            matter_controller::im::WriteItem {
                path: good,
                data: encode_bool(true),
                data_version: None,
            },
            matter_controller::im::WriteItem {
                path: bad,
                data: encode_u8(1),
                data_version: None,
            },
        ];

        let (failed, peer_result) = join(client.set_multiple_attributes(items), peer).await;

        peer_result.unwrap();
        let failed = failed.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].path, bad);
        assert_eq!(failed[0].status.effective(), IMStatusCode::UnsupportedWrite);
    });
}

async fn scripted_invoke_peer(
    peer_end: TestExchange,
    expected_command: u32,
    response: InvokeRespMsg,
) -> Result<(), Error> {
    let mut messenger = ImMessenger::new(peer_end);
    let payload = messenger.read(OpCode::InvokeRequest).await?;
    let req = InvokeReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
    assert_eq!(req.invoke_requests.len(), 1);
    assert_eq!(req.invoke_requests[0].path.command, Some(expected_command));

    messenger.send(OpCode::InvokeResponse, &response).await?;
    Ok(())
}

// Invariant 8: the invoke decision table
#[test]
fn invoke_success_status_yields_unit_for_no_response() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Status(CmdStatus {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x02),
                status: Status::new(IMStatusCode::Success),
            })],
        };

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &on_off::CMD_TOGGLE, &()),
            scripted_invoke_peer(peer_end, 0x02, response),
        )
        .await;

        peer_result.unwrap();
        let _: NoResponse = result.unwrap();
    });
}

#[test]
fn invoke_failure_status_carries_the_code() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Status(CmdStatus {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x02),
                status: Status::new(IMStatusCode::InvalidCommand),
            })],
        };

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &on_off::CMD_TOGGLE, &()),
            scripted_invoke_peer(peer_end, 0x02, response),
        )
        .await;

        peer_result.unwrap();
        match result.unwrap_err().code() {
            ErrorCode::InvokeFailure(status) => {
                assert_eq!(status.effective(), IMStatusCode::InvalidCommand)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    });
}

#[test]
fn invoke_decodes_a_typed_response() {
    const CMD_WITH_RESPONSE: Command<(), u8> = Command::new(0x10, 0x11, false);

    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Command(CmdData {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x11),
                fields: Some(encode_u8(42)),
            })],
        };

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &CMD_WITH_RESPONSE, &()),
            scripted_invoke_peer(peer_end, 0x10, response),
        )
        .await;

        peer_result.unwrap();
        assert_eq!(result.unwrap(), 42);
    });
}

#[test]
fn invoke_with_mismatched_response_command_is_a_protocol_error() {
    const CMD_WITH_RESPONSE: Command<(), u8> = Command::new(0x10, 0x11, false);

    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Command(CmdData {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x77),
                fields: Some(encode_u8(42)),
            })],
        };

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &CMD_WITH_RESPONSE, &()),
            scripted_invoke_peer(peer_end, 0x10, response),
        )
        .await;

        peer_result.unwrap();
        assert_eq!(result.unwrap_err().code(), ErrorCode::Invalid);
    });
}

#[test]
fn invoke_without_entries_errors_unless_optional() {
    const OPTIONAL_CMD: Command<(), NoResponse> = Command::new(0x20, 0x20, true);

    block_on(async {
        // Non-optional: an empty response list is a protocol error
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &on_off::CMD_ON, &()),
            scripted_invoke_peer(peer_end, 0x01, InvokeRespMsg::default()),
        )
        .await;
        peer_result.unwrap();
        assert_eq!(result.unwrap_err().code(), ErrorCode::Invalid);

        // Optional: the same shape is accepted
        let (client_end, peer_end) = exchange_pair(1);
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &OPTIONAL_CMD, &()),
            scripted_invoke_peer(peer_end, 0x20, InvokeRespMsg::default()),
        )
        .await;
        peer_result.unwrap();
        result.unwrap();
    });
}

#[test]
fn optional_typed_invoke_defaults_when_data_is_absent() {
    const OPTIONAL_TYPED: Command<(), u8> = Command::new(0x30, 0x31, true);

    block_on(async {
        // No response entry at all: the optional command yields the default
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &OPTIONAL_TYPED, &()),
            scripted_invoke_peer(peer_end, 0x30, InvokeRespMsg::default()),
        )
        .await;
        peer_result.unwrap();
        assert_eq!(result.unwrap(), 0);

        // A bare success status is treated the same way
        let (client_end, peer_end) = exchange_pair(1);
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Status(CmdStatus {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x30),
                status: Status::new(IMStatusCode::Success),
            })],
        };
        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &OPTIONAL_TYPED, &()),
            scripted_invoke_peer(peer_end, 0x30, response),
        )
        .await;
        peer_result.unwrap();
        assert_eq!(result.unwrap(), 0);

        // When data does arrive, it wins over the default
        let (client_end, peer_end) = exchange_pair(1);
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let response = InvokeRespMsg {
            suppress_response: false,
            invoke_responses: vec![InvokeResult::Command(CmdData {
                path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x31),
                fields: Some(encode_u8(7)),
            })],
        };
        let (result, peer_result) = join(
            client.invoke(ENDPOINT, ON_OFF_CLUSTER, &OPTIONAL_TYPED, &()),
            scripted_invoke_peer(peer_end, 0x30, response),
        )
        .await;
        peer_result.unwrap();
        assert_eq!(result.unwrap(), 7);
    });
}

#[test]
fn subscribe_multiple_dispatches_every_entry() {
    block_on(async {
        let session_id = 4;
        let (client_end, peer_end) = exchange_pair(session_id);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let paths = [
            AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x10),
            AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x11),
        ];

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            let payload = messenger.read(OpCode::SubscribeRequest).await?;
            let req = SubscribeReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(req.attr_requests.len(), 2);

            messenger
                .send(
                    OpCode::ReportData,
                    &ReportDataMsg {
                        subscription_id: Some(5),
                        attr_reports: vec![u8_report(0x10, 1), u8_report(0x11, 2)],
                        more_chunks: false,
                        suppress_response: false,
                    },
                )
                .await?;
            messenger.read(OpCode::StatusResponse).await?;
            messenger
                .send(
                    OpCode::SubscribeResponse,
                    &SubscribeRespMsg {
                        subscription_id: 5,
                        max_interval: 30,
                    },
                )
                .await?;
            Ok::<_, Error>(())
        };

        let (subscription_id, peer_result) = join(
            client.subscribe_multiple_attributes(&paths, 0, 30, move |reports| {
                sink.borrow_mut().push(reports.len());
            }),
            peer,
        )
        .await;

        peer_result.unwrap();
        assert_eq!(subscription_id.unwrap(), 5);
        assert_eq!(seen.borrow().as_slice(), &[2]);

        // Both entries landed in the cache
        assert!(client.cached(ENDPOINT, ON_OFF_CLUSTER, 0x10).is_some());
        assert!(client.cached(ENDPOINT, ON_OFF_CLUSTER, 0x11).is_some());
    });
}

#[test]
fn on_off_facade_binds_the_cluster() {
    use matter_controller::dm::on_off::OnOffClient;

    block_on(async {
        let (toggle_end, toggle_peer) = exchange_pair(1);
        let (read_end, read_peer) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client =
            InteractionClient::new(QueueProvider::new(vec![toggle_end, read_end]), &manager);
        let on_off = OnOffClient::new(&client, ENDPOINT);

        let peer = async {
            // Toggle invocation
            scripted_invoke_peer(
                toggle_peer,
                0x02,
                InvokeRespMsg {
                    suppress_response: false,
                    invoke_responses: vec![InvokeResult::Status(CmdStatus {
                        path: CmdPath::new(ENDPOINT, ON_OFF_CLUSTER, 0x02),
                        status: Status::new(IMStatusCode::Success),
                    })],
                },
            )
            .await?;

            // Attribute read
            let mut messenger = ImMessenger::new(read_peer);
            let payload = messenger.read(OpCode::ReadRequest).await?;
            let req = ReadReqMsg::from_tlv(&get_root_node_struct(&payload)?)?;
            assert_eq!(
                req.attr_requests,
                vec![AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR)]
            );
            messenger
                .send(
                    OpCode::ReportData,
                    &ReportDataMsg {
                        subscription_id: None,
                        attr_reports: vec![AttrReport::data(
                            AttrPath::new(ENDPOINT, ON_OFF_CLUSTER, ON_OFF_ATTR),
                            encode_bool(true),
                            3,
                        )],
                        more_chunks: false,
                        suppress_response: false,
                    },
                )
                .await?;
            messenger.read(OpCode::StatusResponse).await?;
            Ok::<_, Error>(())
        };

        let client_side = async {
            on_off.toggle().await?;
            on_off.on_off().await
        };

        let (value, peer_result) = join(client_side, peer).await;
        peer_result.unwrap();
        assert!(value.unwrap());
    });
}

#[test]
fn peer_status_response_aborts_a_read() {
    block_on(async {
        let (client_end, peer_end) = exchange_pair(1);
        let manager = SubscriptionManager::new();
        let client = InteractionClient::new(QueueProvider::new(vec![client_end]), &manager);

        let peer = async {
            let mut messenger = ImMessenger::new(peer_end);
            messenger.read(OpCode::ReadRequest).await?;
            messenger.send_status(IMStatusCode::Busy).await?;
            Ok::<_, Error>(())
        };

        let (result, peer_result) = join(
            client.get_multiple_attributes(&[AttrPath::WILDCARD]),
            peer,
        )
        .await;

        peer_result.unwrap();
        match result.unwrap_err().code() {
            ErrorCode::ImStatus(status) => {
                assert_eq!(status.effective(), IMStatusCode::Busy)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    });
}
