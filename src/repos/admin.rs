use super::repo::*;
use crate::models::*;

const ADMIN_TABLE: &str = "admins";
const SESSION_TABLE: &str = "admin_sessions";

pub trait AdminRepo: DbRepo<Admin, AdminInserter, AdminFilter, DummyAdminUpdater> {}

pub type AdminRepoImpl = DbRepoImpl<Admin, AdminInserter, AdminFilter, DummyAdminUpdater>;
impl AdminRepo for AdminRepoImpl {}

pub fn make_admin_repo() -> AdminRepoImpl {
    AdminRepoImpl::new(ADMIN_TABLE)
}

pub trait AdminSessionRepo:
    DbRepo<AdminSession, AdminSessionInserter, AdminSessionFilter, DummyAdminSessionUpdater>
{
}

pub type AdminSessionRepoImpl =
    DbRepoImpl<AdminSession, AdminSessionInserter, AdminSessionFilter, DummyAdminSessionUpdater>;
impl AdminSessionRepo for AdminSessionRepoImpl {}

pub fn make_session_repo() -> AdminSessionRepoImpl {
    AdminSessionRepoImpl::new(SESSION_TABLE)
}
