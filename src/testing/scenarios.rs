use super::bench::{cache_config, Bench, MEMORY_LATENCY};
use crate::cache::{DirectMapped, State, Store};
use crate::config::CacheKind;
use crate::packet::Command;
use crate::Packet;
use color_eyre::eyre;
use pretty_assertions_sorted as diff;

fn direct_mapped(num_lines: usize, num_ports: usize) -> Bench<DirectMapped> {
    let config = cache_config(CacheKind::DirectMapped, num_lines, 1);
    Bench::new(config, DirectMapped::new(num_lines, 64), num_ports)
}

#[test]
fn test_hit_after_write_miss() -> eyre::Result<()> {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);

    bench.write(0x40, &[0x01, 0x02, 0x03, 0x04]);
    assert_eq!(bench.cache.num_resident_lines(), 1);

    let accepted = bench.queue.now();
    bench
        .send(0, Packet::read(0x40, 4, 0))
        .map_err(|packet| eyre::eyre!("refused {packet}"))?;
    assert_eq!(bench.cache.state(), State::WaitAccess);
    bench.run_events();
    assert!(bench.queue.now() - accepted >= 1);

    let responses = bench.requestors[0].responses();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1].cmd(), Command::ReadResp);
    assert_eq!(responses[1].data(), &[0x01, 0x02, 0x03, 0x04]);

    let stats = bench.cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
    assert_eq!(stats.miss_latency.samples(), 1);
    assert_eq!(stats.miss_latency.sum(), MEMORY_LATENCY);
    assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn test_sub_block_read_upgrades_to_block_fetch() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    bench.memory.write_bytes(0x40, &(0..64).collect::<Vec<u8>>());

    let original = Packet::read(0x42, 2, 0);
    bench.send(0, original.clone()).unwrap();
    bench.run_events();

    let requests = bench.memory.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].cmd(), Command::ReadReq);
    assert_eq!(requests[0].addr(), 0x40);
    assert_eq!(requests[0].size(), 64);
    assert_ne!(requests[0], original);
    assert_eq!(bench.cache.state(), State::WaitMem);
    assert!(bench.requestors[0].responses().is_empty());

    bench.respond_memory();
    let responses = bench.requestors[0].responses();
    diff::assert_eq!(responses, vec![original]);
    assert_eq!(responses[0].cmd(), Command::ReadResp);
    assert_eq!(responses[0].addr(), 0x42);
    assert_eq!(responses[0].data(), &[2, 3]);
    assert_eq!(bench.cache.stats().misses, 1);
    assert!(!bench.cache.is_blocked());
}

#[test]
fn test_block_sized_miss_is_forwarded() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    let data: Vec<u8> = (0..64).map(|i| 255 - i).collect();
    let write = Packet::write(0x80, &data, 0);
    bench.send(0, write.clone()).unwrap();
    bench.run_events();
    assert_eq!(bench.memory.requests(), vec![write]);

    bench.respond_memory();
    assert_eq!(bench.read(0x80, 64), data);
    let stats = bench.cache.stats();
    assert_eq!((stats.hits, stats.misses), (1, 1));
}

#[test]
fn test_eviction_writes_back_victims_in_order() {
    super::init_logging();
    let mut bench = direct_mapped(2, 1);
    bench.write(0x00, &[1, 1, 1, 1]);
    bench.write(0x80, &[2, 2, 2, 2]);
    bench.write(0x100, &[3, 3, 3, 3]);

    diff::assert_eq!(bench.writebacks(), vec![0x00, 0x80]);
    let writebacks = bench.memory.requests_of(Command::WritebackDirty);
    assert!(writebacks.iter().all(|packet| packet.size() == 64));
    assert_eq!(&writebacks[0].data()[..4], &[1, 1, 1, 1]);
    assert_eq!(&writebacks[1].data()[..4], &[2, 2, 2, 2]);
    assert_eq!(bench.memory.read_bytes(0x80, 4), vec![2, 2, 2, 2]);
    assert!(bench.cache.store().lookup(0x100).is_some());
    assert_eq!(bench.cache.num_resident_lines(), 1);
}

#[test]
fn test_blocked_request_is_retried_once() {
    super::init_logging();
    let mut bench = direct_mapped(256, 2);
    bench.send(0, Packet::read(0x40, 4, 0)).unwrap();
    bench.run_events();
    assert!(bench.cache.is_blocked());
    assert_eq!(bench.cache.waiting_port(), Some(0));

    let refused = bench.send(1, Packet::read(0x80, 4, 1));
    let Err(refused) = refused else {
        panic!("request accepted while blocked");
    };
    assert!(bench.cache.cpu_port(1).needs_retry());
    assert_eq!(bench.requestors[1].num_retries(), 0);

    bench.respond_memory();
    assert_eq!(bench.requestors[0].responses().len(), 1);
    assert_eq!(bench.requestors[0].num_retries(), 0);
    assert_eq!(bench.requestors[1].num_retries(), 1);
    assert!(!bench.cache.is_blocked());

    bench.send(1, refused).unwrap();
    assert_eq!(bench.cache.waiting_port(), Some(1));
}

#[test]
fn test_refused_port_stays_refused_until_retry() {
    super::init_logging();
    let mut bench = direct_mapped(256, 2);
    bench.send(0, Packet::read(0x40, 4, 0)).unwrap();
    bench.run_events();

    assert!(bench.send(1, Packet::read(0x80, 4, 1)).is_err());
    assert!(bench.send(1, Packet::read(0x80, 4, 1)).is_err());
    bench.respond_memory();
    assert_eq!(bench.requestors[1].num_retries(), 1);
}

#[test]
fn test_parked_response_is_delivered_once() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    bench.requestors[0].refuse_responses(1);

    bench.send(0, Packet::read(0x40, 4, 0)).unwrap();
    bench.run_events();
    bench.respond_memory();

    assert_eq!(bench.requestors[0].num_refused(), 1);
    assert!(bench.requestors[0].responses().is_empty());
    assert!(bench.cache.cpu_port(0).blocked_packet().is_some());
    assert!(!bench.cache.is_blocked());

    // the port refuses new requests while its response is parked
    let Err(refused) = bench.send(0, Packet::read(0x80, 4, 0)) else {
        panic!("request accepted while a response is parked");
    };

    bench.cache.recv_resp_retry(0);
    let responses = bench.requestors[0].responses();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].addr(), 0x40);
    assert!(bench.cache.cpu_port(0).blocked_packet().is_none());
    assert_eq!(bench.requestors[0].num_retries(), 1);

    bench.send(0, refused).unwrap();
    bench.run_events();
    bench.respond_memory();
    assert_eq!(bench.requestors[0].responses().len(), 2);
}

#[test]
fn test_parked_request_is_resent_on_retry() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    bench.memory.refuse_requests(1);

    bench.send(0, Packet::read(0x40, 64, 0)).unwrap();
    bench.run_events();
    assert!(bench.memory.requests().is_empty());
    assert!(bench.cache.mem_port().blocked_packet().is_some());

    bench.cache.recv_req_retry();
    assert_eq!(bench.memory.requests().len(), 1);
    bench.respond_memory();
    assert_eq!(bench.requestors[0].responses().len(), 1);
}

#[test]
fn test_miss_waits_for_parked_writeback() {
    super::init_logging();
    let mut bench = direct_mapped(1, 1);
    bench.write(0x00, &[0xab]);

    // the writeback of 0x00 is refused while 0x40 is installed
    bench.send(0, Packet::read(0x40, 4, 0)).unwrap();
    bench.run_events();
    bench.memory.refuse_requests(1);
    bench.respond_memory();
    assert_eq!(bench.requestors[0].responses().len(), 2);
    let parked = bench.cache.mem_port().blocked_packet().cloned();
    assert_eq!(parked.map(|packet| packet.cmd()), Some(Command::WritebackDirty));

    bench.send(0, Packet::read(0x80, 4, 0)).unwrap();
    bench.run_events();
    assert_eq!(bench.cache.state(), State::WaitMem);
    assert_eq!(bench.memory.requests_of(Command::ReadReq).len(), 2);

    bench.cache.recv_req_retry();
    assert!(bench.cache.mem_port().blocked_packet().is_none());
    let sent: Vec<_> = bench
        .memory
        .requests()
        .iter()
        .skip(2)
        .map(|packet| (packet.cmd(), packet.addr()))
        .collect();
    diff::assert_eq!(
        sent,
        vec![(Command::WritebackDirty, 0x00), (Command::ReadReq, 0x80)]
    );

    bench.respond_memory();
    assert_eq!(bench.requestors[0].responses().len(), 3);
    assert_eq!(bench.memory.read_bytes(0x00, 1), vec![0xab]);
    assert!(!bench.cache.is_blocked());
}

#[test]
fn test_fully_associative_random_eviction_is_reproducible() {
    super::init_logging();
    let evictions = |seed| {
        let config = cache_config(CacheKind::FullyAssociative, 4, 4);
        let mut bench = Bench::from_config(config, 1, seed);
        for block in 0..8u64 {
            bench.read(block * 64, 64);
        }
        assert_eq!(bench.cache.num_resident_lines(), 4);
        bench.writebacks()
    };
    let first = evictions(42);
    assert_eq!(first.len(), 4);
    diff::assert_eq!(first, evictions(42));
}

#[test]
fn test_functional_accesses_do_not_change_stats() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    bench.write(0x40, &[9, 8, 7, 6]);
    let before = bench.cache.stats();

    let mut resident = Packet::read(0x40, 4, 0);
    bench.cache.recv_functional(0, &mut resident);
    assert_eq!(resident.cmd(), Command::ReadResp);
    assert_eq!(resident.data(), &[9, 8, 7, 6]);
    assert_eq!(bench.memory.num_functional(), 0);

    let mut absent = Packet::write(0x1000, &[1, 2], 0);
    bench.cache.recv_functional(0, &mut absent);
    assert_eq!(absent.cmd(), Command::WriteResp);
    assert_eq!(bench.memory.num_functional(), 1);
    assert_eq!(bench.memory.read_bytes(0x1000, 2), vec![1, 2]);

    assert_eq!(bench.cache.stats(), before);
    assert!(bench.cache.store().lookup(0x1000).is_none());
    assert!(!bench.cache.is_blocked());
}

#[test]
fn test_functional_read_matches_bypass() {
    super::init_logging();
    let mut bench = direct_mapped(256, 1);
    bench.memory.write_bytes(0x200, &[4, 3, 2, 1]);
    bench.read(0x200, 4);
    assert!(bench.cache.store().lookup(0x200).is_some());

    let mut through_cache = Packet::read(0x201, 3, 0);
    bench.cache.recv_functional(0, &mut through_cache);
    assert_eq!(through_cache.data(), bench.memory.read_bytes(0x201, 3));
}

#[test]
fn test_port_names_and_ranges() {
    let mut bench = direct_mapped(4, 2);
    assert_eq!(bench.cache.port_name("mem_side", None), "cache.mem_side");
    assert_eq!(bench.cache.port_name("cpu_side", Some(1)), "cache.cpu_side[1]");
    assert_eq!(bench.cache.addr_ranges(), vec![0..(1 << 32)]);

    bench.cache.recv_range_change();
    assert!(bench
        .requestors
        .iter()
        .all(|requestor| requestor.num_range_changes() == 1));
}

#[test]
#[should_panic(expected = "not a vector port")]
fn test_mem_side_vector_index_is_fatal() {
    let bench = direct_mapped(4, 1);
    let _ = bench.cache.port_name("mem_side", Some(0));
}

#[test]
#[should_panic(expected = "no such port")]
fn test_unknown_cpu_port_is_fatal() {
    let bench = direct_mapped(4, 1);
    let _ = bench.cache.port_name("cpu_side", Some(1));
}

#[test]
#[should_panic(expected = "not supported")]
fn test_atomic_access_is_fatal() {
    let mut bench = direct_mapped(4, 1);
    bench.cache.recv_atomic(0, Packet::read(0x40, 4, 0));
}

#[test]
#[should_panic(expected = "span multiple cache lines")]
fn test_spanning_access_is_fatal() {
    let mut bench = direct_mapped(4, 1);
    bench.send(0, Packet::read(0x3e, 4, 0)).unwrap();
    bench.run_events();
}

#[test]
#[should_panic(expected = "not waiting for one")]
fn test_unexpected_response_is_fatal() {
    let mut bench = direct_mapped(4, 1);
    let mut response = Packet::read(0x40, 64, 0);
    response.make_response();
    bench.cache.recv_timing_resp(response, &bench.queue);
}

#[test]
fn test_set_associative_store_through_cache() {
    super::init_logging();
    let config = cache_config(CacheKind::SetAssociative, 4, 2);
    let mut bench = Bench::from_config(config, 1, 0);
    // all map to set 0
    bench.write(0x000, &[1]);
    bench.write(0x080, &[2]);
    assert!(bench.writebacks().is_empty());
    bench.write(0x100, &[3]);
    assert_eq!(bench.writebacks().len(), 1);
    assert_eq!(bench.read(0x100, 1), vec![3]);
    assert!(bench.cache.num_resident_lines() <= bench.cache.capacity());
}
