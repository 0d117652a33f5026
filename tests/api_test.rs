mod common;

use crate::common::{Api, Server, ServerBuilder, MINING_REWARD, STARTING_BALANCE};
use serial_test::serial;

#[test]
#[serial]
fn test_should_get_the_genesis_block() {
    let node = ServerBuilder::new().start();
    let blocks = node.get_blocks();

    assert_eq!(blocks.len(), 1);
    assert_eq!(node.get_length(), 1);

    let genesis_block = blocks.first().unwrap();

    assert_eq!(genesis_block.last_hash, "genesis_last_hash");
    assert_eq!(genesis_block.hash, "genesis_hash");
    assert!(genesis_block.data.is_empty());
}

#[test]
#[serial]
fn test_should_pool_and_mine_transactions() {
    let node = ServerBuilder::new().start();
    let wallet = node.get_wallet_info();
    assert_eq!(wallet.balance, STARTING_BALANCE);

    let res = node.transact("alice", 30);
    assert_eq!(res.status().as_u16(), 200);

    let res = node.transact("bob", 20);
    assert_eq!(res.status().as_u16(), 200);

    let pooled = node.get_transactions();
    assert_eq!(pooled.len(), 1);
    assert_eq!(pooled[0].output["alice"], 30);
    assert_eq!(pooled[0].output["bob"], 20);
    assert_eq!(pooled[0].output[&wallet.address], STARTING_BALANCE - 50);

    let block = node.mine();
    assert_eq!(block.data.len(), 2);
    assert_eq!(block.data[0], pooled[0]);
    assert_eq!(block.last_hash, "genesis_hash");

    assert_eq!(node.get_length(), 2);
    assert_eq!(node.get_last_block(), block);
    assert!(node.get_transactions().is_empty());

    let wallet = node.get_wallet_info();
    assert_eq!(wallet.balance, STARTING_BALANCE - 50 + MINING_REWARD);

    let addresses = node.get_known_addresses();
    for address in ["alice", "bob", wallet.address.as_str()] {
        assert!(addresses.iter().any(|known| known == address));
    }
}

#[test]
#[serial]
fn test_should_reject_overspending() {
    let node = ServerBuilder::new().start();

    let res = node.transact("alice", STARTING_BALANCE + 1);

    assert_eq!(res.status().as_u16(), 400);
    assert!(node.get_transactions().is_empty());
}

#[test]
#[serial]
fn test_should_list_range_newest_first() {
    let node = ServerBuilder::new().start();
    let first = node.mine();
    let second = node.mine();

    let range = node.get_range(0, 2);

    assert_eq!(range, vec![second, first]);
}

#[test]
#[serial]
fn test_should_not_accept_invalid_block() {
    let node = ServerBuilder::new().start();
    let mut block = node.get_last_block();
    block.last_hash = "not_the_last_hash".to_string();

    let res = node.add_block(&block);

    assert_eq!(res.status().as_u16(), 400);
    assert_eq!(node.get_length(), 1);
}

#[test]
#[serial]
fn test_should_auto_mine_pooled_transactions() {
    let node = ServerBuilder::new().auto_mine().start();

    let res = node.transact("alice", 10);
    assert_eq!(res.status().as_u16(), 200);

    assert!(node.wait_for_log_message("Valid block found for index 1"));
    assert!(Server::wait_until(|| node.get_length() == 2));
    assert!(Server::wait_until(|| node.get_transactions().is_empty()));
}
