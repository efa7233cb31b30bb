mod blocking;
mod provisioning;
mod read_back;
mod transactional;
mod write_only;
