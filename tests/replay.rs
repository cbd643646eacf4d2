mod common;

use std::sync::Arc;

use chainmirror::api::types::tx_hash_hex;
use chainmirror::index::{block as block_index, height as height_index, tx as tx_index};
use chainmirror::storage::chain::ChainStore;
use chainmirror::storage::compress::CompressedKv;
use chainmirror::storage::lmdb::LmdbKvStore;
use chainmirror::{ChannelBlockFeed, CompatMode, MirrorError, MirrorNode, NodeConfig};

use common::support::{make_block, write_genesis, MockEngine};

const MAP_SIZE: usize = 64 << 20;

fn config(dir: &std::path::Path) -> NodeConfig {
    let genesis = write_genesis(dir, 1);
    NodeConfig::new(dir, genesis)
        .with_rest_bind(([127, 0, 0, 1], 0).into())
        .with_lmdb_map_size(MAP_SIZE)
}

#[test]
fn replays_blocks_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    let (feed, publisher) = ChannelBlockFeed::new();
    let node = MirrorNode::new(config.clone(), Arc::new(MockEngine::new()), Arc::new(feed))
        .unwrap();

    publisher.publish(make_block(1, vec![])).unwrap();
    publisher.publish(make_block(2, vec![b"transfer".to_vec()])).unwrap();
    publisher
        .publish(make_block(3, vec![b"mint".to_vec(), b"burn".to_vec()]))
        .unwrap();
    drop(publisher);

    // the feed is closed, so the run loop drains the three blocks and returns
    node.run().unwrap();

    let chain = ChainStore::new(Arc::new(
        LmdbKvStore::open(&config.chain_db_dir(), MAP_SIZE).unwrap(),
    ));
    let state = chain.load_state().unwrap().unwrap();
    assert_eq!(state.last_block_height, 3);
    assert_eq!(state.chain_id, "mirror-test-1");
    assert!(chain.load_block(2).unwrap().is_some());

    let index = CompressedKv::new(
        Arc::new(LmdbKvStore::open(&config.index_db_dir(), MAP_SIZE).unwrap()),
        CompatMode::Enabled,
    );
    let marker = height_index::latest_height(&index).unwrap().unwrap();
    assert_eq!(marker.height, 3);

    let record = block_index::block_by_height(&index, 2).unwrap().unwrap();
    assert_eq!(record.block.txs.len(), 1);

    let tx = tx_index::tx_by_hash(&index, &tx_hash_hex(b"mint")).unwrap().unwrap();
    assert_eq!(tx.height, 3);
    assert_eq!(tx.index, 0);
    let listing = tx_index::txs_by_height(&index, 3).unwrap().unwrap();
    assert_eq!(listing.len(), 2);
}

#[test]
fn restart_resumes_from_persisted_height() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    let (feed, publisher) = ChannelBlockFeed::new();
    let node = MirrorNode::new(config.clone(), Arc::new(MockEngine::new()), Arc::new(feed))
        .unwrap();
    publisher.publish(make_block(1, vec![])).unwrap();
    publisher.publish(make_block(2, vec![])).unwrap();
    drop(publisher);
    node.run().unwrap();

    // second process generation over the same data dir
    let (feed, publisher) = ChannelBlockFeed::new();
    let node = MirrorNode::new(config.clone(), Arc::new(MockEngine::new()), Arc::new(feed))
        .unwrap();
    publisher.publish(make_block(3, vec![])).unwrap();
    drop(publisher);
    node.run().unwrap();

    let chain = ChainStore::new(Arc::new(
        LmdbKvStore::open(&config.chain_db_dir(), MAP_SIZE).unwrap(),
    ));
    assert_eq!(chain.load_state().unwrap().unwrap().last_block_height, 3);
}

#[test]
fn engine_rejection_restores_previous_generation() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    let (feed, publisher) = ChannelBlockFeed::new();
    let node = MirrorNode::new(
        config.clone(),
        Arc::new(MockEngine::rejecting(3)),
        Arc::new(feed),
    )
    .unwrap();

    publisher.publish(make_block(1, vec![])).unwrap();
    publisher.publish(make_block(2, vec![])).unwrap();
    publisher.publish(make_block(3, vec![])).unwrap();
    drop(publisher);

    let err = node.run().unwrap_err();
    assert!(matches!(err, MirrorError::Engine(_)));

    // height 2's rollback was applied, so the store holds height 1's state;
    // the indexes keep height 2 since rollback only covers the primary store
    let chain = ChainStore::new(Arc::new(
        LmdbKvStore::open(&config.chain_db_dir(), MAP_SIZE).unwrap(),
    ));
    assert_eq!(chain.load_state().unwrap().unwrap().last_block_height, 1);

    let index = CompressedKv::new(
        Arc::new(LmdbKvStore::open(&config.index_db_dir(), MAP_SIZE).unwrap()),
        CompatMode::Enabled,
    );
    let marker = height_index::latest_height(&index).unwrap().unwrap();
    assert_eq!(marker.height, 2);
    assert!(block_index::block_by_height(&index, 3).unwrap().is_none());
}

#[test]
fn second_node_on_same_data_dir_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(tmp.path());

    let (feed, _publisher) = ChannelBlockFeed::new();
    let _held = MirrorNode::new(config.clone(), Arc::new(MockEngine::new()), Arc::new(feed))
        .unwrap();

    let (feed, _publisher) = ChannelBlockFeed::new();
    assert!(matches!(
        MirrorNode::new(config, Arc::new(MockEngine::new()), Arc::new(feed)),
        Err(MirrorError::DataDirLocked { .. })
    ));
}
