//! 存储层数据模型

/// 用户记录（认证回调使用）。
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: String,
    /// 登录名（邮箱）。
    pub username: String,
    /// argon2 PHC 格式口令哈希。
    pub password_hash: String,
}
