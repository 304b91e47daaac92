//! Property tests for the device state-sync ratchet (spec §8, testable
//! property 5: "the bootstrap sync step never assigns a pool-owned state and
//! never demotes a device").
