//! S3: a device rebound to `vfio-pci` for a claim is rebound back to its
//! original driver once the claim is torn down (spec §8 scenarios, spec
//! §4.4.3 full prepare/unprepare round trip).
